use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::core::coordinator::Source;
use crate::core::reading::Reading;
use crate::web::{AppError, AppState};

/// `POST /api/sensor-data`
///
/// The body is parsed regardless of its declared content type, so simple
/// clients that forget the header still work.
pub async fn ingest_reading(State(coordinator): State<AppState>, body: Bytes) -> Result<Json<Value>, AppError> {
    let raw: Value = serde_json::from_slice(&body).map_err(AppError::MalformedBody)?;
    let reading = coordinator.submit(&raw, Source::Http).await?;

    Ok(Json(json!({
        "message": "Sensor data stored",
        "data": reading,
    })))
}

/// `GET /api/data`
pub async fn history(State(coordinator): State<AppState>) -> Json<Vec<Reading>> {
    Json(coordinator.history().await)
}

/// `POST /api/clear-data`
pub async fn clear_history(State(coordinator): State<AppState>) -> Result<Json<Value>, AppError> {
    coordinator.request_clear().await.map_err(AppError::ClearFailed)?;
    Ok(Json(json!({ "message": "Historical data cleared" })))
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
