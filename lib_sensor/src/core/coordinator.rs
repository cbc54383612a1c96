//! # Ingestion Coordinator
//!
//! Every producer hands its raw payload to `submit`. A reading moves through
//! `Received -> Validated -> Persisted -> Broadcast`, or stops at `Rejected`.
//! The broadcast only happens once the store has durably written the reading,
//! so a viewer can never be told about a reading that a history request made
//! right after would not return.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::core::reading::Reading;
use crate::core::registry::{LiveMessage, SubscriberId, SubscriberRegistry, Subscription};
use crate::core::store::{DurableStore, StorageError};
use crate::core::validator::{self, RejectReason};

/// Where a submission came from. Used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// The HTTP ingestion API (the simulated producer posts here).
    Http,
    /// The serial device line reader.
    SerialLine,
    /// An in-process simulated producer.
    Simulated,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Source::Http => "http",
            Source::SerialLine => "serial",
            Source::Simulated => "simulated",
        };
        f.write_str(name)
    }
}

/// Why a submission did not complete.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The payload failed validation. Nothing was persisted or broadcast.
    #[error("reading rejected: {0}")]
    Rejected(#[from] RejectReason),
    /// The reading was valid but could not be persisted. Nothing was broadcast.
    #[error("reading could not be stored: {0}")]
    Storage(#[from] StorageError),
}

/// Validate, persist, broadcast.
pub struct IngestionCoordinator {
    store: Arc<DurableStore>,
    registry: Arc<SubscriberRegistry>,
    // Held across persist + broadcast so the live feed sees mutations in store order.
    sequencer: Mutex<()>,
}

impl IngestionCoordinator {
    /// Wires a coordinator over an opened store and a registry.
    pub fn new(store: Arc<DurableStore>, registry: Arc<SubscriberRegistry>) -> Self {
        Self {
            store,
            registry,
            sequencer: Mutex::new(()),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<DurableStore> {
        &self.store
    }

    /// The underlying registry.
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Runs one raw payload through the pipeline and returns the stored reading.
    pub async fn submit(&self, raw: &Value, source: Source) -> Result<Reading, IngestError> {
        let reading = match validator::validate(raw) {
            Ok(reading) => reading,
            Err(reason) => {
                log::warn!("Rejected reading from {}: {}", source, reason);
                return Err(reason.into());
            }
        };

        let _seq = self.sequencer.lock().await;

        if let Err(e) = self.store.append(reading.clone()).await {
            log::error!("Error writing reading from {} to history: {}", source, e);
            return Err(e.into());
        }

        let report = self.registry.broadcast(LiveMessage::NewReading(reading.clone()));
        log::debug!(
            "Reading from {} stored and sent to {} subscriber(s): {:?}",
            source,
            report.delivered,
            reading
        );
        Ok(reading)
    }

    /// Clears the history and tells every subscriber, in that order.
    pub async fn request_clear(&self) -> Result<(), StorageError> {
        let _seq = self.sequencer.lock().await;

        if let Err(e) = self.store.clear().await {
            log::error!("Error clearing history: {}", e);
            return Err(e);
        }

        let report = self.registry.broadcast(LiveMessage::DataCleared);
        log::info!("History cleared. Notified {} subscriber(s).", report.delivered);
        Ok(())
    }

    /// The full ordered history.
    pub async fn history(&self) -> Vec<Reading> {
        self.store.read_all().await
    }

    /// Registers a live viewer.
    pub fn subscribe(&self, label: &str) -> Subscription {
        self.registry.register(label)
    }

    /// Drops a live viewer.
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.registry.unregister(id)
    }
}
