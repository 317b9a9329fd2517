use thiserror::Error;

#[derive(Debug, Error)]
pub enum OriginError {
    #[error("origin request failed: {message}")]
    Request { message: String },
    #[error("origin returned status {status}")]
    Status { status: u16 },
    #[error("invalid origin response: {message}")]
    Decode { message: String },
}

#[derive(Debug, Error)]
pub enum EventParseError {
    #[error("invalid event payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("event id is empty")]
    EmptyId,
}
