//! Error types for the coordinator service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::fmt;

use swapmeet_types::SwapError;

/// Coordinator error type. Domain errors keep their taxonomy; the
/// remaining variants cover the service's own failure modes.
#[derive(Debug)]
pub enum Error {
    /// Swap domain error (validation, state, conflict, ledger revert).
    Swap(SwapError),
    /// Ledger transport failure (submission never evaluated).
    Rpc(String),
    /// Configuration error.
    Config(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Swap(e) => write!(f, "{e}"),
            Error::Rpc(msg) => write!(f, "rpc error: {msg}"),
            Error::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<SwapError> for Error {
    fn from(e: SwapError) -> Self {
        Error::Swap(e)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Swap(SwapError::Validation(_)) => StatusCode::BAD_REQUEST,
            Error::Swap(SwapError::InvalidState(_)) => StatusCode::CONFLICT,
            Error::Swap(SwapError::AssetConflict { .. }) => StatusCode::CONFLICT,
            Error::Swap(SwapError::NotFound(_)) => StatusCode::NOT_FOUND,
            Error::Swap(SwapError::Unauthorized(_)) => StatusCode::FORBIDDEN,
            // Reverts are caller-correctable, not server faults.
            Error::Swap(SwapError::LedgerRejection(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Rpc(_) => StatusCode::BAD_GATEWAY,
            Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({
            "success": false,
            "error": self.to_string()
        });
        (status, Json(body)).into_response()
    }
}
