//! Error types for the domain tracker service

use std::time::Duration;

/// Errors that can occur in the domain tracker service
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Upstream returned HTTP {0}")]
    UnexpectedStatus(u16),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Malformed response: {0}")]
    Format(String),

    #[error("Cycle timed out after {0:?}")]
    Timeout(Duration),
}

impl TrackerError {
    /// Whether the operator has to supply new credentials before polling resumes
    pub fn requires_reauth(&self) -> bool {
        matches!(self, TrackerError::Auth(_))
    }

    /// Whether the next scheduled cycle may simply try again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TrackerError::Transport(_)
                | TrackerError::UnexpectedStatus(_)
                | TrackerError::Format(_)
                | TrackerError::Timeout(_)
        )
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(e: serde_json::Error) -> Self {
        TrackerError::Format(e.to_string())
    }
}

/// Result type alias for domain tracker operations
pub type Result<T> = std::result::Result<T, TrackerError>;
