//! # Retrieval Module
//!
//! Outbound HTTP for the producers that talk to the server over the network.
//!
//! - **`api_client`**: a JSON `ApiClient` built on `reqwest` and
//!   `reqwest-middleware`, retrying transient failures with exponential
//!   backoff.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Retrying JSON HTTP client.
pub mod api_client;

pub use api_client::{ApiClient, ApiResponse};
