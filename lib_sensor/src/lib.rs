//! # lib_sensor
//!
//! Shared library for the sensor dashboard backend. The `core` module is the
//! ingestion-and-broadcast pipeline (validation, durable history, live fan-out)
//! and is always compiled. Producers, the HTTP client and the web layer sit
//! behind cargo features so each binary only pulls what it uses.

#![forbid(unsafe_code)]

// Declare the modules to re-export
pub mod core;

#[cfg(feature = "ingestors")]
pub mod ingestors;

#[cfg(feature = "retrieve")]
pub mod retrieve;

#[cfg(feature = "web")]
pub mod web;

// Re-export the pipeline types most callers need
pub use crate::core::coordinator::{IngestError, IngestionCoordinator, Source};
pub use crate::core::reading::Reading;
pub use crate::core::registry::{BroadcastReport, LiveMessage, SubscriberId, SubscriberRegistry, Subscription};
pub use crate::core::store::{DurableStore, StorageError};
pub use crate::core::validator::{validate, RejectReason};
