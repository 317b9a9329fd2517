use std::time::Duration;

/// Tunable knobs for the distribution pipeline. Everything time-based is
/// injected here rather than hard-coded at the use site.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// How often the poller queries the origin store while viewers are
    /// connected.
    pub poll_interval: Duration,
    /// How often every connected viewer receives a heartbeat, independent of
    /// event traffic.
    pub heartbeat_interval: Duration,
    /// How long a forwarded event id is remembered to suppress redelivery.
    pub dedup_ttl: chrono::Duration,
    /// Page size for origin queries.
    pub page_limit: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(30),
            dedup_ttl: chrono::Duration::minutes(5),
            page_limit: 50,
        }
    }
}
