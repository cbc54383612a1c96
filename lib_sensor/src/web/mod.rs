//! # Web Layer
//!
//! Axum surface of the service: the ingestion, history and clear APIs, the
//! live WebSocket feed, a health probe and the dashboard's static files.
//!
//! ## Routes:
//! - `POST /api/sensor-data` ingests one reading.
//! - `GET /api/data` returns the full history.
//! - `POST /api/clear-data` clears the history and notifies viewers.
//! - `GET /ws` upgrades to the live feed.
//! - `GET /health` answers `OK`.
//! - Anything else is served from the public directory, falling back to
//!   `index.html`.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

use std::path::Path;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};

use crate::core::coordinator::IngestionCoordinator;

/// Error-to-response mapping.
pub mod error;
/// Request handlers for the JSON API.
pub mod handlers;
/// WebSocket connection handling.
pub mod live_feed;

pub use error::AppError;

/// Shared state handed to every handler.
pub type AppState = Arc<IngestionCoordinator>;

/// Builds the complete application router.
pub fn router(coordinator: AppState, public_dir: impl AsRef<Path>) -> Router {
    let public_dir = public_dir.as_ref();
    let static_files = ServeDir::new(public_dir).fallback(ServeFile::new(public_dir.join("index.html")));
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/api/sensor-data", post(handlers::ingest_reading))
        .route("/api/data", get(handlers::history))
        .route("/api/clear-data", post(handlers::clear_history))
        .route("/ws", get(live_feed::ws_handler))
        .route("/health", get(handlers::health))
        .fallback_service(static_files)
        .layer(cors)
        .with_state(coordinator)
}
