use crate::hub::BroadcastHub;
use chrono::Utc;
use pulse_core::Event;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Spawn the polling loop for `hub`. Exactly one poller runs per process;
/// the hub starts it on the first viewer and aborts it after the last one.
pub(crate) fn spawn(hub: Weak<BroadcastHub>, poll_interval: Duration) -> JoinHandle<()> {
    tokio::spawn(run(hub, poll_interval))
}

async fn run(hub: Weak<BroadcastHub>, poll_interval: Duration) {
    let mut interval = tokio::time::interval(poll_interval);
    loop {
        interval.tick().await;
        let Some(hub) = hub.upgrade() else { return };
        poll_once(&hub).await;
    }
}

/// One poll cycle: fetch a page, validate, filter through the dedup cache
/// and watermark, forward what is genuinely new, then sweep the cache.
async fn poll_once(hub: &Arc<BroadcastHub>) {
    let page = match hub.origin().recent_events(hub.config().page_limit).await {
        Ok(page) => page,
        Err(err) => {
            // Transient by assumption; the next tick retries. Viewers just
            // see no new events this cycle.
            warn!(error = %err, "origin fetch failed");
            return;
        }
    };

    let mut events: Vec<Event> = Vec::with_capacity(page.len());
    for raw in page {
        match Event::from_raw(raw) {
            Ok(event) => events.push(event),
            Err(err) => warn!(error = %err, "discarding malformed upstream event"),
        }
    }
    // The origin returns most recent first; forward oldest first.
    events.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    let now = Utc::now();
    let fresh: Vec<Event> = {
        let mut state = hub.poll_state();
        let mut fresh = Vec::new();
        for event in events {
            if state.dedup.has(&event.id) {
                continue;
            }
            // Belt and suspenders next to the dedup cache: a replayed id or
            // an event surfacing after the watermark passed it is dropped.
            if let Some(watermark) = state.watermark {
                if event.created_at <= watermark {
                    continue;
                }
            }
            state.dedup.mark(&event.id, now);
            state.watermark = Some(event.created_at);
            fresh.push(event);
        }
        state.dedup.sweep(now);
        fresh
    };

    for event in &fresh {
        debug!(id = %event.id, event_type = %event.event_type, "forwarding event");
        hub.publish(event);
    }
}
