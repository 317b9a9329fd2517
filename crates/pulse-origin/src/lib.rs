use async_trait::async_trait;
use pulse_core::{OriginError, OriginStore};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the origin event-store service.
#[derive(Debug, Clone)]
pub struct HttpOrigin {
    client: reqwest::Client,
    base_url: String,
}

/// The origin returns either a bare array or an envelope with pagination;
/// both shapes are accepted transparently.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EventsPage {
    Wrapped { events: Vec<Value> },
    Bare(Vec<Value>),
}

impl EventsPage {
    fn into_events(self) -> Vec<Value> {
        match self {
            EventsPage::Wrapped { events } => events,
            EventsPage::Bare(events) => events,
        }
    }
}

impl HttpOrigin {
    pub fn new(base_url: impl Into<String>) -> Result<Self, OriginError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| OriginError::Request {
                message: err.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl OriginStore for HttpOrigin {
    async fn recent_events(&self, limit: u32) -> Result<Vec<Value>, OriginError> {
        let url = format!("{}/events?limit={limit}", self.base_url);
        let response =
            self.client
                .get(&url)
                .send()
                .await
                .map_err(|err| OriginError::Request {
                    message: err.to_string(),
                })?;

        let status = response.status();
        if !status.is_success() {
            return Err(OriginError::Status {
                status: status.as_u16(),
            });
        }

        let page: EventsPage = response.json().await.map_err(|err| OriginError::Decode {
            message: err.to_string(),
        })?;
        Ok(page.into_events())
    }
}
