//! Provider error taxonomy.
//!
//! Every failure an adapter can produce collapses into one of three
//! retryable kinds — timeout, upstream rate limit, or any other provider
//! failure — plus non-retryable configuration and decoding errors that
//! indicate a bug rather than upstream weather. The fallback executor
//! advances the chain on all of them.

use thiserror::Error;

/// Errors raised by provider adapters.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The upstream call exceeded its wall-clock deadline.
    #[error("provider timed out")]
    Timeout,

    /// The upstream returned HTTP 429.
    #[error("provider rate limit exceeded")]
    RateLimited,

    /// The upstream returned a non-success status.
    #[error("API error: {code} - {message}")]
    Api { code: u16, message: String },

    /// Transport-level failure below the HTTP status line.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    /// The upstream body did not decode as JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The upstream body decoded but did not carry the expected shape.
    #[error("invalid response: {message}")]
    InvalidResponse { message: String },

    /// Adapter misconfiguration detected before any call was made.
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        // reqwest surfaces the client-level deadline as a timeout error on
        // the request future; classify it before the generic transport case.
        if err.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Http(err)
        }
    }
}

impl ProviderError {
    /// Stable label used for the `error_type` metric dimension and log
    /// field. Collapses the enum into the three externally visible kinds.
    pub fn error_type(&self) -> &'static str {
        match self {
            ProviderError::Timeout => "timeout",
            ProviderError::RateLimited => "rate_limit",
            _ => "provider_error",
        }
    }
}
