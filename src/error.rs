//! Service error types with HTTP status code mapping.
//!
//! [`MonitorError`] is the central error type. The chain-facing variants
//! (`Connection`, `NotConnected`, `Upstream`, `Computation`,
//! `Initialization`) are produced by the collection pipeline; the rest
//! come from storage and the REST layer. Each variant maps to a numeric
//! code and an HTTP status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::domain::ParachainId;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "alert not found: 0d4c...",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                 |
/// |-----------|-----------------|-----------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request             |
/// | 2000–2999 | Not Found       | 404 Not Found               |
/// | 3000–3999 | Server          | 500 Internal Server Error   |
/// | 5000–5999 | Chain / Upstream| 502 / 503                   |
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// The chain RPC endpoint could not be reached at connect time.
    #[error("connection error: {0}")]
    Connection(String),

    /// An operation was attempted without a live chain session.
    #[error("data aggregator not connected")]
    NotConnected,

    /// A chain RPC call failed after the session was established.
    #[error("upstream error during {operation} for parachain {parachain_id}: {message}")]
    Upstream {
        /// Parachain the failing call was made for.
        parachain_id: ParachainId,
        /// Aggregator operation name (e.g. `"calculate_tvl"`).
        operation: &'static str,
        /// Underlying RPC failure.
        message: String,
    },

    /// A derived value could not be computed (e.g. missing price feed).
    #[error("computation error: {0}")]
    Computation(String),

    /// The scheduler could not start.
    #[error("initialization error: {0}")]
    Initialization(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Alert with the given ID was not found.
    #[error("alert not found: {0}")]
    AlertNotFound(uuid::Uuid),

    /// Parachain with the given ID is not registered.
    #[error("parachain not found: {0}")]
    ParachainNotFound(ParachainId),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A notification channel failed to deliver.
    #[error("notification error: {0}")]
    Notification(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MonitorError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::AlertNotFound(_) => 2001,
            Self::ParachainNotFound(_) => 2002,
            Self::Internal(_) => 3000,
            Self::Persistence(_) => 3001,
            Self::Notification(_) => 3002,
            Self::Initialization(_) => 3003,
            Self::Connection(_) => 5001,
            Self::NotConnected => 5002,
            Self::Upstream { .. } => 5003,
            Self::Computation(_) => 5004,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::AlertNotFound(_) | Self::ParachainNotFound(_) => StatusCode::NOT_FOUND,
            Self::Connection(_) | Self::NotConnected => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream { .. } | Self::Computation(_) => StatusCode::BAD_GATEWAY,
            Self::Persistence(_)
            | Self::Notification(_)
            | Self::Initialization(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for MonitorError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl IntoResponse for MonitorError {
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
