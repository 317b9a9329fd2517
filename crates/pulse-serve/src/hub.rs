use crate::config::StreamConfig;
use crate::poller;
use chrono::{DateTime, SecondsFormat, Utc};
use pulse_core::{DedupCache, Event, OriginStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Outbound buffer per viewer. A viewer that falls this far behind is
/// disconnected rather than buffered indefinitely.
const VIEWER_BUFFER: usize = 64;

/// Fan-out point between the single upstream poller and all connected
/// viewers. Owns the viewer registry, the poller lifecycle, and the shared
/// poll state (dedup cache + watermark); all of it is reached through this
/// one instance injected via `AppState`, never through globals.
pub struct BroadcastHub {
    origin: Arc<dyn OriginStore>,
    config: StreamConfig,
    registry: Mutex<Registry>,
    poll_state: Mutex<PollState>,
    // Handed to spawned tasks so neither the poller nor the heartbeat keeps
    // the hub alive.
    self_weak: Weak<BroadcastHub>,
}

struct Registry {
    viewers: HashMap<String, mpsc::Sender<String>>,
    poller: Option<JoinHandle<()>>,
}

pub(crate) struct PollState {
    pub dedup: DedupCache,
    pub watermark: Option<DateTime<Utc>>,
}

impl BroadcastHub {
    pub fn new(origin: Arc<dyn OriginStore>, config: StreamConfig) -> Arc<Self> {
        let heartbeat_interval = config.heartbeat_interval;
        let hub = Arc::new_cyclic(|weak| Self {
            origin,
            poll_state: Mutex::new(PollState {
                dedup: DedupCache::new(config.dedup_ttl),
                watermark: None,
            }),
            config,
            registry: Mutex::new(Registry {
                viewers: HashMap::new(),
                poller: None,
            }),
            self_weak: weak.clone(),
        });
        tokio::spawn(heartbeat_loop(Arc::downgrade(&hub), heartbeat_interval));
        hub
    }

    /// Register a viewer. The `connected` ack is queued before this returns,
    /// so it is always the first message the viewer receives. The poller is
    /// started only on the empty-to-non-empty edge.
    pub fn connect(&self) -> (String, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(VIEWER_BUFFER);
        let ack = serde_json::json!({
            "type": "connected",
            "message": "event stream established"
        })
        .to_string();
        let _ = tx.try_send(ack);

        let id = ulid::Ulid::new().to_string();
        let mut registry = lock(&self.registry);
        let was_empty = registry.viewers.is_empty();
        registry.viewers.insert(id.clone(), tx);
        info!(viewer = %id, viewers = registry.viewers.len(), "viewer connected");

        if was_empty && registry.poller.is_none() {
            // No replay across an idle window: anything older than this
            // moment is the origin store's problem, not the stream's.
            let now = Utc::now();
            let mut poll = lock(&self.poll_state);
            poll.watermark = Some(poll.watermark.map_or(now, |mark| mark.max(now)));
            drop(poll);
            registry.poller = Some(poller::spawn(
                self.self_weak.clone(),
                self.config.poll_interval,
            ));
            info!("first viewer connected, poller started");
        }
        (id, rx)
    }

    /// Remove a viewer, stopping the poller if it was the last one. Called
    /// both for explicit disconnects and for failed writes; there is exactly
    /// one teardown path.
    pub fn disconnect(&self, id: &str) {
        let mut registry = lock(&self.registry);
        if registry.viewers.remove(id).is_some() {
            debug!(viewer = %id, viewers = registry.viewers.len(), "viewer disconnected");
        }
        stop_poller_if_idle(&mut registry);
    }

    /// Serialize once, then write to every registered viewer.
    pub fn publish(&self, event: &Event) {
        match serde_json::to_string(event) {
            Ok(payload) => self.fan_out(payload),
            Err(err) => warn!(error = %err, id = %event.id, "failed to serialize event"),
        }
    }

    /// Deliver a payload to every viewer. A full or closed channel counts as
    /// a disconnect; the viewer is removed inside the same registry lock so
    /// no write can race its teardown.
    pub(crate) fn fan_out(&self, payload: String) {
        let mut registry = lock(&self.registry);
        let dropped: Vec<String> = registry
            .viewers
            .iter()
            .filter(|(_, tx)| tx.try_send(payload.clone()).is_err())
            .map(|(id, _)| id.clone())
            .collect();
        for id in &dropped {
            registry.viewers.remove(id);
            debug!(viewer = %id, "dropping unresponsive viewer");
        }
        stop_poller_if_idle(&mut registry);
    }

    pub fn viewer_count(&self) -> usize {
        lock(&self.registry).viewers.len()
    }

    pub fn poller_running(&self) -> bool {
        lock(&self.registry).poller.is_some()
    }

    pub(crate) fn origin(&self) -> &Arc<dyn OriginStore> {
        &self.origin
    }

    pub(crate) fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub(crate) fn poll_state(&self) -> MutexGuard<'_, PollState> {
        lock(&self.poll_state)
    }
}

fn stop_poller_if_idle(registry: &mut Registry) {
    if registry.viewers.is_empty() {
        if let Some(handle) = registry.poller.take() {
            handle.abort();
            info!("last viewer disconnected, poller stopped");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn heartbeat_loop(hub: Weak<BroadcastHub>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    // The first tick of a tokio interval fires immediately; consume it so
    // heartbeats land at t+30s, t+60s, ...
    interval.tick().await;
    loop {
        interval.tick().await;
        let Some(hub) = hub.upgrade() else { return };
        let payload = serde_json::json!({
            "type": "heartbeat",
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
        })
        .to_string();
        hub.fan_out(payload);
    }
}
