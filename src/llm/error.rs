//! Model endpoint error types.
//!
//! There is no retry layer: every variant is terminal for the caller.

use thiserror::Error;

/// Error from model endpoint calls.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Connection failed or the request timed out
    #[error("Model endpoint unreachable: {0}")]
    Unreachable(String),

    /// The endpoint answered with a non-2xx status
    #[error("Model endpoint rejected request (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    /// The envelope could not be read (bad JSON, no choices, empty content)
    #[error("Invalid model response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    /// Classify a transport-level reqwest failure.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Unreachable(format!("request timed out: {}", err))
        } else if err.is_decode() {
            LlmError::InvalidResponse(err.to_string())
        } else {
            LlmError::Unreachable(err.to_string())
        }
    }
}
