//! # Subscriber Registry
//!
//! Keeps the set of live viewers and fans messages out to them.
//!
//! ## Design:
//!
//! 1.  **Shared Fan-out**: a broadcast message is wrapped in an `Arc` once and
//!     every subscriber receives a pointer to the same allocation.
//!
//! 2.  **One Queue per Subscriber**: `register` hands back the receiving half of
//!     a bounded MPSC queue. The connection task drains it into its socket, so
//!     each subscriber sees messages in the order `broadcast` was called.
//!
//! 3.  **Never Block the Producer**: `broadcast` uses `try_send`. A closed queue
//!     means the connection is gone and the subscriber is pruned. A full queue
//!     means the viewer is lagging past its buffer; it is evicted, which closes
//!     its queue so the connection task shuts the socket and the viewer can
//!     reconnect and reload history.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::json;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::core::reading::Reading;

/// Default per-subscriber queue depth.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

/// Opaque handle identifying one registered subscriber.
pub type SubscriberId = u64;

/// A message pushed to every live subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveMessage {
    /// A reading that has just been persisted.
    NewReading(Reading),
    /// The history was cleared.
    DataCleared,
}

impl LiveMessage {
    /// JSON text sent over the live feed.
    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        match self {
            LiveMessage::NewReading(reading) => serde_json::to_string(reading),
            LiveMessage::DataCleared => serde_json::to_string(&json!({
                "type": "dataCleared",
                "message": "Historical data has been cleared.",
            })),
        }
    }
}

/// The receiving side of a registration.
#[derive(Debug)]
pub struct Subscription {
    /// Id to pass to `unregister` when the connection ends.
    pub id: SubscriberId,
    /// Messages broadcast after registration, in broadcast order.
    pub receiver: mpsc::Receiver<Arc<LiveMessage>>,
}

/// What a single `broadcast` call did. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers the message was queued for.
    pub delivered: usize,
    /// Subscribers removed because their connection was closed.
    pub pruned: usize,
    /// Subscribers removed because their queue was full.
    pub evicted: usize,
}

impl BroadcastReport {
    /// Total number of subscribers a delivery was attempted to.
    pub fn attempts(&self) -> usize {
        self.delivered + self.pruned + self.evicted
    }
}

struct SubscriberHandle {
    label: String,
    sender: mpsc::Sender<Arc<LiveMessage>>,
}

/// Owns every live subscriber.
pub struct SubscriberRegistry {
    subscribers: Mutex<HashMap<SubscriberId, SubscriberHandle>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

impl SubscriberRegistry {
    /// Creates an empty registry whose subscribers buffer up to `buffer` messages.
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    /// Registers a new subscriber. `label` only appears in logs.
    pub fn register(&self, label: &str) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.buffer);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        self.lock().insert(
            id,
            SubscriberHandle {
                label: label.to_string(),
                sender,
            },
        );
        log::info!("Subscriber {} ('{}') registered", id, label);

        Subscription { id, receiver }
    }

    /// Removes a subscriber. Unknown ids are ignored.
    pub fn unregister(&self, id: SubscriberId) {
        if let Some(handle) = self.lock().remove(&id) {
            log::info!("Subscriber {} ('{}') unregistered", id, handle.label);
        }
    }

    /// Number of live subscribers.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when nobody is listening.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queues `message` for every subscriber without waiting on any of them.
    ///
    /// The registry lock is held for the whole fan-out, so concurrent
    /// broadcasts reach every subscriber in the same order.
    pub fn broadcast(&self, message: LiveMessage) -> BroadcastReport {
        let message = Arc::new(message);
        let mut report = BroadcastReport::default();

        self.lock().retain(|id, handle| match handle.sender.try_send(Arc::clone(&message)) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(TrySendError::Closed(_)) => {
                log::info!("Subscriber {} ('{}') disconnected. Removing from registry.", id, handle.label);
                report.pruned += 1;
                false
            }
            Err(TrySendError::Full(_)) => {
                log::warn!(
                    "Subscriber {} ('{}') is {} messages behind. Evicting.",
                    id,
                    handle.label,
                    self.buffer
                );
                report.evicted += 1;
                false
            }
        });

        report
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriberId, SubscriberHandle>> {
        // A panic while holding this lock cannot leave the map half-updated.
        self.subscribers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
