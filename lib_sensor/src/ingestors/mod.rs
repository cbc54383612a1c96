//! # Data Ingestors Module
//!
//! Producers that feed the `IngestionCoordinator`. Each submodule handles the
//! framing and lifecycle of one kind of source and hands every decoded reading
//! to `IngestionCoordinator::submit`.
//!
//! ## Contained Modules:
//! - **`line_protocol`**: decoder for the device's `distance:<n>,tds:<n>` lines.
//! - **`serial_line`**: a long-lived reader that frames a byte stream into
//!   lines, submits each one, and reconnects after a fixed delay when the
//!   transport fails.
//! - **`simulated`**: the random-walk generator used by the dummy producer.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Decoder for the device line protocol.
pub mod line_protocol;
/// Resilient line reader over a reconnectable byte stream.
pub mod serial_line;
/// Random-walk reading generator.
pub mod simulated;

// --- Public API Re-exports ---
pub use line_protocol::{parse_line, LineError};
pub use serial_line::{LineConnector, SerialLineConfig, SerialLineIngestor, TransportError};
#[cfg(feature = "serial")]
pub use serial_line::SerialPortConnector;
pub use simulated::DummyGenerator;
