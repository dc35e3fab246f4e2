use std::time::Duration;
use thiserror::Error;

/// Errors that can escape a pipeline run or a store operation.
///
/// Only [`Validation`](StoryError::Validation) and the text-provider
/// failures ([`Provider`](StoryError::Provider), [`Request`](StoryError::Request))
/// are produced by [`StoryPipeline::run`](crate::StoryPipeline::run).
/// Parse and illustration failures are recovered inside the run and never
/// surface here.
#[derive(Error, Debug)]
pub enum StoryError {
    /// Caller-supplied parameters failed a basic constraint.
    #[error("Invalid story parameters: {0}")]
    Validation(String),

    /// The text-generation endpoint returned a non-success status or an
    /// envelope without the generated text.
    ///
    /// `status` is the HTTP status of the response (a 2xx status means the
    /// envelope itself was malformed) and `body` is the provider's response
    /// body, kept for diagnostics.
    #[error("Provider error (HTTP {status}): {body}")]
    Provider {
        /// HTTP status code.
        status: u16,
        /// Response body text.
        body: String,
        /// Parsed `Retry-After` header value, if present.
        retry_after: Option<Duration>,
    },

    /// Low-level HTTP transport failure (connection refused, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem failure in a persistence collaborator.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration detected at build time.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

impl StoryError {
    /// Whether this error came from the text-generation provider
    /// (non-success status, malformed envelope, or transport failure).
    pub fn is_provider_error(&self) -> bool {
        matches!(self, StoryError::Provider { .. } | StoryError::Request(_))
    }
}

impl From<anyhow::Error> for StoryError {
    fn from(err: anyhow::Error) -> Self {
        StoryError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_display_carries_status_and_body() {
        let err = StoryError::Provider {
            status: 403,
            body: "API key not valid".into(),
            retry_after: None,
        };
        let msg = err.to_string();
        assert!(msg.contains("403"));
        assert!(msg.contains("API key not valid"));
        assert!(err.is_provider_error());
    }

    #[test]
    fn test_validation_is_not_provider_error() {
        let err = StoryError::Validation("child name is empty".into());
        assert!(!err.is_provider_error());
    }

    #[test]
    fn test_anyhow_maps_to_other() {
        let err: StoryError = anyhow::anyhow!("boom").into();
        assert!(matches!(err, StoryError::Other(ref m) if m == "boom"));
    }
}
