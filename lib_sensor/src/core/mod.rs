//! # Core Pipeline Module
//!
//! The ingestion-and-broadcast pipeline. Every reading, whatever produced it,
//! flows through the same components:
//!
//! - **`reading`**: the `Reading` record and its wire format.
//! - **`validator`**: turns an untyped payload into a `Reading` or a
//!   `RejectReason`. Pure, no side effects.
//! - **`store`**: the durable, timestamp-ordered history. One JSON snapshot on
//!   disk, rewritten atomically under a writer lock.
//! - **`registry`**: the set of live subscribers. Non-blocking fan-out over
//!   bounded per-subscriber queues, pruning closed or lagging connections.
//! - **`coordinator`**: validate, persist, then broadcast. A reading is only
//!   announced once the store durably holds it.

#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Coordinates validation, persistence and broadcast for every producer.
pub mod coordinator;
/// The `Reading` record shared by every component.
pub mod reading;
/// Live subscriber bookkeeping and fan-out.
pub mod registry;
/// Durable, ordered history of readings.
pub mod store;
/// Normalization and rejection of raw payloads.
pub mod validator;

// --- Public API Re-exports ---
pub use coordinator::{IngestError, IngestionCoordinator, Source};
pub use reading::Reading;
pub use registry::{BroadcastReport, LiveMessage, SubscriberId, SubscriberRegistry, Subscription};
pub use store::{DurableStore, StorageError};
pub use validator::{validate, validate_at, RejectReason};
