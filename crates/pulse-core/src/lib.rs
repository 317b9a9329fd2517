pub mod correlate;
pub mod dedup;
pub mod error;
pub mod event;
pub mod origin;

pub use crate::correlate::{group, EventGroup, GroupType};
pub use crate::dedup::DedupCache;
pub use crate::error::{EventParseError, OriginError};
pub use crate::event::{Event, MetaValue};
pub use crate::origin::OriginStore;
