//! Error types for the generation node.

use std::time::Duration;

/// Errors that can occur while running the node.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// No usable API key was supplied or saved.
    #[error("no valid API key provided")]
    MissingApiKey,

    /// The request exceeded its resolution-dependent timeout.
    #[error("request timed out (exceeded {} seconds)", .0.as_secs())]
    Timeout(Duration),

    /// API returned a non-success status.
    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    /// Response body could not be parsed.
    #[error("malformed API response: {0}")]
    MalformedResponse(String),

    /// Response parsed but carried no inline image.
    #[error("no image data in API response{}", detail_suffix(.0))]
    NoImage(Option<String>),

    /// Failed to encode a reference image.
    #[error("failed to encode image: {0}")]
    Encode(String),

    /// Failed to decode base64 or image bytes.
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// Invalid input (tensor shape, parameter value).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error (key file, saving output).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Anything that escaped the typed paths (runtime setup, panics).
    #[error("internal error: {0}")]
    Internal(String),
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|d| format!(" ({d})"))
        .unwrap_or_default()
}

/// Failure classes reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Missing or invalid credential; no request was sent.
    MissingApiKey,
    /// Connection-level failure.
    Network,
    /// Request timed out.
    Timeout,
    /// Non-success HTTP status.
    HttpStatus,
    /// Malformed or image-less response.
    NoImage,
    /// Returned image could not be decoded.
    Decode,
    /// Any other error.
    Internal,
}

impl NodeError {
    /// Classifies this error for reporting.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::MissingApiKey => FailureKind::MissingApiKey,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Api { .. } => FailureKind::HttpStatus,
            Self::MalformedResponse(_) | Self::NoImage(_) => FailureKind::NoImage,
            Self::Decode(_) => FailureKind::Decode,
            Self::Network(e) if e.is_timeout() => FailureKind::Timeout,
            Self::Network(_) => FailureKind::Network,
            Self::Encode(_)
            | Self::InvalidInput(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Internal(_) => FailureKind::Internal,
        }
    }

    /// Returns a remediation hint as `(heading, body)`, if one applies.
    pub fn hint(&self) -> Option<(&'static str, &'static str)> {
        match self.kind() {
            FailureKind::MissingApiKey => Some((
                "Usage",
                "1. Enter your API key in the node\n2. The key is saved to the node directory automatically",
            )),
            FailureKind::Timeout => Some(("Suggestion", "Try a lower resolution (1K or 2K)")),
            _ => None,
        }
    }
}

/// Result type alias for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;
