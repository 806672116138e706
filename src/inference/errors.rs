//! Inference error types.
//!
//! All errors implement `std::error::Error` via `thiserror`. Structured logging
//! is the caller's responsibility; these types carry the context needed to build
//! meaningful log entries.

use thiserror::Error;

/// Errors that can occur during a single model call.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// TCP/HTTP connection to the model endpoint failed.
    #[error("connection failed to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// The model endpoint did not respond within the configured timeout.
    #[error("inference timeout after {duration_secs}s")]
    Timeout { duration_secs: u64 },

    /// Non-2xx HTTP response from the model endpoint.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String },

    /// Client could not be configured (missing key, bad URL).
    #[error("config error: {reason}")]
    ConfigError { reason: String },
}

impl InferenceError {
    /// Timeout or connection failure.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            InferenceError::ConnectionFailed { .. } | InferenceError::Timeout { .. }
        )
    }

    /// Non-success status or malformed response shape.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            InferenceError::HttpError { .. } | InferenceError::MalformedResponse { .. }
        )
    }

    /// Whether another attempt could plausibly succeed.
    pub fn is_retriable(&self) -> bool {
        self.is_transport() || self.is_protocol()
    }
}
