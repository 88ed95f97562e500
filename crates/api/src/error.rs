//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use replication::{PurchaseError, ReplicaError};
use storage::StorageError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Catalog replica error.
    Replica(ReplicaError),
    /// Purchase coordination error.
    Purchase(PurchaseError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Replica(err) => replica_error_to_response(err),
            ApiError::Purchase(err) => purchase_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn replica_error_to_response(err: ReplicaError) -> (StatusCode, String) {
    match &err {
        ReplicaError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        ReplicaError::StockConflict { .. } => (StatusCode::CONFLICT, err.to_string()),
        ReplicaError::Unauthorized => (StatusCode::FORBIDDEN, err.to_string()),
        ReplicaError::Storage(source) => {
            tracing::error!(error = %source, "catalog store failure");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

fn purchase_error_to_response(err: PurchaseError) -> (StatusCode, String) {
    match &err {
        PurchaseError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        PurchaseError::OutOfStock(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        PurchaseError::StockConflict { .. } => (StatusCode::CONFLICT, err.to_string()),
        PurchaseError::UpstreamUnavailable { .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
        }
        PurchaseError::UpstreamTimeout { .. } => (StatusCode::GATEWAY_TIMEOUT, err.to_string()),
        PurchaseError::Persistence { .. } => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

impl From<ReplicaError> for ApiError {
    fn from(err: ReplicaError) -> Self {
        ApiError::Replica(err)
    }
}

impl From<PurchaseError> for ApiError {
    fn from(err: PurchaseError) -> Self {
        ApiError::Purchase(err)
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
