use crate::hub::BroadcastHub;
use crate::AppState;
use axum::http::header;
use axum::response::sse::{Event as SseEvent, Sse};
use axum::response::{IntoResponse, Response};
use futures::stream::StreamExt;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;

/// Deregisters the viewer when its stream is dropped. Client-initiated
/// close and transport failure both end here; there is no second cleanup
/// path.
struct ViewerGuard {
    hub: Arc<BroadcastHub>,
    id: String,
}

impl Drop for ViewerGuard {
    fn drop(&mut self) {
        self.hub.disconnect(&self.id);
    }
}

pub async fn subscribe(state: AppState) -> Response {
    let (id, rx) = state.hub.connect();
    let guard = ViewerGuard {
        hub: state.hub.clone(),
        id,
    };
    let stream = ReceiverStream::new(rx).map(move |payload| {
        // The closure owns the guard, tying the registration to the
        // stream's lifetime.
        let _ = &guard;
        Ok::<SseEvent, Infallible>(SseEvent::default().data(payload))
    });
    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Sse::new(stream),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreamConfig;
    use async_trait::async_trait;
    use pulse_core::{OriginError, OriginStore};
    use serde_json::Value;

    struct EmptyOrigin;

    #[async_trait]
    impl OriginStore for EmptyOrigin {
        async fn recent_events(&self, _limit: u32) -> Result<Vec<Value>, OriginError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn stream_response_carries_sse_headers() {
        let origin: Arc<dyn OriginStore> = Arc::new(EmptyOrigin);
        let config = StreamConfig::default();
        let hub = BroadcastHub::new(origin.clone(), config.clone());
        let state = AppState {
            hub,
            origin,
            config,
        };

        let response = subscribe(state).await;
        let headers = response.headers();
        assert!(headers
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));
        assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "no-cache");
        assert_eq!(headers.get(header::CONNECTION).unwrap(), "keep-alive");
    }
}
