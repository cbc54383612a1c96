//! Maps failures in the pipeline to HTTP responses with JSON bodies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::core::coordinator::IngestError;
use crate::core::store::StorageError;
use crate::core::validator::RejectReason;

/// Everything a handler can fail with.
#[derive(Debug)]
pub enum AppError {
    /// The request body was not JSON.
    MalformedBody(serde_json::Error),
    /// The payload failed validation.
    Rejected(RejectReason),
    /// A valid reading could not be persisted.
    StoreFailed(StorageError),
    /// The history could not be cleared.
    ClearFailed(StorageError),
}

impl From<IngestError> for AppError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::Rejected(reason) => AppError::Rejected(reason),
            IngestError::Storage(e) => AppError::StoreFailed(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::MalformedBody(e) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": format!("Request body is not valid JSON: {}", e),
                    "reason": "malformedBody",
                }),
            ),
            AppError::Rejected(reason) => {
                let code = match reason {
                    RejectReason::MissingField(_) => "missingField",
                    RejectReason::NotNumeric(_) => "notNumeric",
                };
                (
                    StatusCode::BAD_REQUEST,
                    json!({
                        "error": format!("Invalid sensor data: {}", reason),
                        "reason": code,
                        "field": reason.field(),
                    }),
                )
            }
            AppError::StoreFailed(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Failed to store sensor data", "detail": e.to_string() }),
            ),
            AppError::ClearFailed(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Failed to clear data file", "detail": e.to_string() }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(error: AppError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn rejection_carries_reason_and_field() {
        let (status, body) = body_of(AppError::Rejected(RejectReason::MissingField("tds"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["reason"], "missingField");
        assert_eq!(body["field"], "tds");
        assert!(body["error"].as_str().unwrap().contains("tds"));
    }

    #[tokio::test]
    async fn non_numeric_rejection_names_the_field() {
        let (status, body) = body_of(AppError::Rejected(RejectReason::NotNumeric("distance"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["reason"], "notNumeric");
        assert_eq!(body["field"], "distance");
    }

    #[tokio::test]
    async fn malformed_body_is_a_bad_request() {
        let parse_error = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let (status, body) = body_of(AppError::MalformedBody(parse_error)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["reason"], "malformedBody");
    }

    #[tokio::test]
    async fn storage_failures_are_server_errors() {
        let io = StorageError::Io {
            path: "/nowhere/data.json".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let (status, body) = body_of(AppError::ClearFailed(io)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to clear data file");
        assert!(body["detail"].as_str().is_some());
    }
}
