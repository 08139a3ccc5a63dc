//! Gateway error types and their HTTP mapping.
//!
//! Terminal pipeline failures map onto the small set of status codes the
//! gateway exposes: 401 for credential problems, 429 for local rate
//! limiting, 400 for malformed bodies, 502 when the whole provider chain
//! failed, 500 otherwise. Bodies are `{detail: ...}` JSON; 5xx responses
//! also carry the request id so callers can correlate with logs and
//! metrics. Messages never include upstream secrets or stack traces.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::storage::StoreError;

/// Terminal errors produced by the request pipeline.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Missing, invalid or inactive credential.
    #[error("{message}")]
    Auth { message: String },

    /// The caller's token bucket is empty.
    #[error("rate limit exceeded")]
    RateLimited,

    /// The request body failed validation.
    #[error("{message}")]
    InvalidRequest { message: String },

    /// Every provider in the fallback chain failed.
    #[error("LLM provider error: {message}")]
    ProvidersExhausted { request_id: String, message: String },

    /// Anything that should not happen in a healthy process.
    #[error("internal server error")]
    Internal { message: String },
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        GatewayError::Internal {
            message: err.to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            GatewayError::Auth { message } => (
                StatusCode::UNAUTHORIZED,
                json!({ "detail": message }),
            ),
            GatewayError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({ "detail": "Rate limit exceeded" }),
            ),
            GatewayError::InvalidRequest { message } => (
                StatusCode::BAD_REQUEST,
                json!({ "detail": message }),
            ),
            GatewayError::ProvidersExhausted { request_id, .. } => (
                StatusCode::BAD_GATEWAY,
                json!({ "detail": self.to_string(), "request_id": request_id }),
            ),
            // The underlying message goes to the logs, not the client.
            GatewayError::Internal { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "detail": "Internal server error" }),
            ),
        };

        (status, Json(body)).into_response()
    }
}
