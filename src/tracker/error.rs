//! Issue tracker error types.

use thiserror::Error;

/// Error from issue tracker calls.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Connection failed or the request timed out
    #[error("Tracker unreachable: {0}")]
    Unreachable(String),

    /// The tracker answered with a non-2xx status
    #[error("Tracker rejected request (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    /// A 2xx answer we could not read
    #[error("Invalid tracker response: {0}")]
    InvalidResponse(String),

    /// The issue exists in the tracker but a follow-up field update failed
    #[error("issue {key} was created but updating it failed: {source}")]
    UpdateAfterCreateFailed {
        key: String,
        #[source]
        source: Box<TrackerError>,
    },

    /// One item of a bulk creation failed; later items were not attempted.
    ///
    /// `index` is 1-based. `created` holds every key committed in the tracker,
    /// including a half-finished issue of the failing item.
    #[error("failed to create item {index} of {total} ({summary:?}): {source}")]
    ItemFailed {
        index: usize,
        total: usize,
        summary: String,
        created: Vec<String>,
        #[source]
        source: Box<TrackerError>,
    },
}

impl TrackerError {
    /// Key of an issue that was committed despite this error.
    pub fn committed_key(&self) -> Option<&str> {
        match self {
            TrackerError::UpdateAfterCreateFailed { key, .. } => Some(key.as_str()),
            _ => None,
        }
    }


    /// Classify a transport-level reqwest failure.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TrackerError::Unreachable(format!("request timed out: {}", err))
        } else {
            TrackerError::Unreachable(err.to_string())
        }
    }
}
