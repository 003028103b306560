//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for both the reconstruction
//! engine and the HTTP surface. Each variant maps to a numeric code and an
//! HTTP status, and renders the structured JSON error body below.
//!
//! The type is `Clone` so that a single in-flight reconstruction pass can
//! hand the same failure to every caller that joined it.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 3002,
///     "message": "snapshot unavailable: rpc error -32000: node is syncing",
///     "details": "listings"
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see the table on [`GatewayError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Engine and server error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category               | HTTP Status               |
/// |-----------|------------------------|---------------------------|
/// | 1000–1999 | Validation             | 400 Bad Request           |
/// | 2000–2999 | Not Found / Malformed  | 404 Not Found / 502       |
/// | 3000–3999 | Server / Upstream      | 500 / 502 / 503           |
/// | 4000–4999 | Configuration          | 500 Internal Server Error |
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The chain node could not be reached or the HTTP exchange failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The chain node answered with a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message reported by the node.
        message: String,
    },

    /// An object, dynamic field, or snapshot does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Data returned by the node did not have the expected shape.
    #[error("malformed data: {0}")]
    Malformed(String),

    /// A required chain identifier is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The latest reconstruction pass for a topic failed.
    #[error("snapshot unavailable: {0}")]
    SnapshotUnavailable(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns `true` for failures worth retrying: network faults and
    /// node-side RPC errors.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Rpc { .. })
    }

    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::NotFound(_) => 2001,
            Self::Malformed(_) => 2002,
            Self::Internal(_) => 3000,
            Self::Transport(_) => 3001,
            Self::SnapshotUnavailable(_) => 3002,
            Self::Rpc { .. } => 3003,
            Self::Configuration(_) => 4001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Transport(_) | Self::Rpc { .. } | Self::Malformed(_) => StatusCode::BAD_GATEWAY,
            Self::SnapshotUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Configuration(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(GatewayError::Transport("timeout".to_string()).is_transient());
        assert!(
            GatewayError::Rpc {
                code: -32000,
                message: "busy".to_string()
            }
            .is_transient()
        );
        assert!(!GatewayError::NotFound("0x1".to_string()).is_transient());
        assert!(!GatewayError::Configuration("missing".to_string()).is_transient());
    }

    #[test]
    fn snapshot_failure_maps_to_503() {
        let err = GatewayError::SnapshotUnavailable("listings".to_string());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.error_code(), 3002);
    }

    #[test]
    fn into_response_carries_status() {
        let response = GatewayError::InvalidRequest("bad owner".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
