use crate::error::OriginError;
use async_trait::async_trait;
use serde_json::Value;

/// Read side of the origin event store.
///
/// Items come back as raw JSON, most recent first; validation into [`Event`]
/// happens at the consumer boundary so one malformed item never discards a
/// whole page.
///
/// [`Event`]: crate::event::Event
#[async_trait]
pub trait OriginStore: Send + Sync {
    async fn recent_events(&self, limit: u32) -> Result<Vec<Value>, OriginError>;
}
