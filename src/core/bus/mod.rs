//! In-process publish/subscribe event bus with glob-style channel patterns.
//!
//! Built on `tokio::sync::broadcast` as a named-channel registry:
//! channels are created on first use and addressed by name or glob
//! pattern. Publish is cooperative and non-blocking: a lagging or
//! dropped subscriber never blocks the publisher or other subscribers.

use std::any::Any;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Type-erased event payload. Concrete event types downcast via `Any`.
pub type Event = Arc<dyn Any + Send + Sync>;

const CHANNEL_CAPACITY: usize = 1024;

/// A single glob-style subscription: `*` matches exactly one
/// `.`-delimited segment of the channel name (`market.orderbook.<market_id>`,
/// `market.orderbook.*`, …).
fn glob_match(pattern: &str, channel: &str) -> bool {
    let pattern_parts: Vec<&str> = pattern.split('.').collect();
    let channel_parts: Vec<&str> = channel.split('.').collect();
    if pattern_parts.len() != channel_parts.len() {
        return false;
    }
    pattern_parts
        .iter()
        .zip(channel_parts.iter())
        .all(|(p, c)| *p == "*" || p == c)
}

struct Topic {
    tx: broadcast::Sender<Event>,
}

/// Process-wide pub/sub bus. Cheap to clone (wraps an `Arc`-backed map);
/// intended to be constructed once at startup and shared via `Clone`.
#[derive(Clone)]
pub struct EventBus {
    topics: Arc<DashMap<String, Topic>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            topics: Arc::new(DashMap::new()),
        }
    }

    fn topic(&self, channel: &str) -> broadcast::Sender<Event> {
        self.topics
            .entry(channel.to_string())
            .or_insert_with(|| Topic {
                tx: broadcast::channel(CHANNEL_CAPACITY).0,
            })
            .tx
            .clone()
    }

    /// Publish an event on an exact channel name. Subscriber failures
    /// (lagged/closed receivers) never propagate to the publisher or
    /// to other subscribers; within this `(publisher, channel)` pair,
    /// delivery order matches publish order because all subscribers
    /// share one `broadcast::Sender`.
    pub fn publish<T: Send + Sync + 'static>(&self, channel: &str, payload: T) {
        let tx = self.topic(channel);
        // A send error only means there are currently no receivers on
        // this exact channel; glob subscribers still need a chance to
        // see it, so publish on every topic whose pattern matches too.
        let event: Event = Arc::new(payload);
        let _ = tx.send(event.clone());
        for entry in self.topics.iter() {
            let pattern = entry.key();
            if pattern != channel && glob_match(pattern, channel) {
                let _ = entry.value().tx.send(event.clone());
            }
        }
        debug!(channel, "published event");
    }

    /// Subscribe to an exact channel or glob pattern. Returns a receiver
    /// that yields type-erased events; callers downcast with
    /// [`Subscription::recv_as`].
    #[must_use]
    pub fn subscribe(&self, channel_or_pattern: &str) -> Subscription {
        Subscription {
            rx: self.topic(channel_or_pattern).subscribe(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Subscription {
    rx: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Receive the next event, downcast to `T`. Lag (dropped messages
    /// because the subscriber fell behind) is swallowed and the next
    /// available event returned, per the bus's at-most-once,
    /// best-effort delivery contract.
    pub async fn recv_as<T: Send + Sync + 'static>(&mut self) -> Option<Arc<T>> {
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    if let Ok(typed) = event.downcast::<T>() {
                        return Some(typed);
                    }
                    // Same channel, different payload type: ignore and keep polling.
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "subscriber lagged, dropping missed events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
