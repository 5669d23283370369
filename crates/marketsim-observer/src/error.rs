//! Error types for the viewer API server.
//!
//! [`ObserverError`] unifies all failure modes into a single enum that
//! can be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use marketsim_bridge::BridgeError;

/// Errors that can occur in the viewer API layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The request did not validate.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The requested simulation binary does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<BridgeError> for ObserverError {
    fn from(error: BridgeError) -> Self {
        let message = error.client_message();
        match error {
            BridgeError::InvalidRequest(_) => Self::InvalidRequest(message),
            BridgeError::BinaryNotFound { .. } => Self::NotFound(message),
            BridgeError::Spawn { .. } | BridgeError::Channel(_) => Self::Internal(message),
        }
    }
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Serialization(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("JSON error: {e}"))
            }
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
