//! Error types for hookchat-wire

use thiserror::Error;

/// Result type alias using hookchat-wire Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the webhook
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Webhook answered with a non-success status
    #[error("Webhook returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The session deadline elapsed
    #[error("Request timed out")]
    Timeout,

    /// The session was cancelled by the host
    #[error("Request aborted")]
    Aborted,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Whether this error should be reported as a timeout rather than a
    /// generic connection failure
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Timeout => true,
            Error::Http(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Whether this error came from the host cancelling the session
    pub fn is_aborted(&self) -> bool {
        matches!(self, Error::Aborted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_classification() {
        assert!(Error::Timeout.is_timeout());
        assert!(!Error::Aborted.is_timeout());
        assert!(
            !Error::Status {
                status: 504,
                body: "gateway timeout".into()
            }
            .is_timeout()
        );
    }

    #[test]
    fn test_aborted_classification() {
        assert!(Error::Aborted.is_aborted());
        assert!(!Error::Timeout.is_aborted());
    }

    #[test]
    fn test_status_display() {
        let e = Error::Status {
            status: 500,
            body: "boom".into(),
        };
        assert_eq!(e.to_string(), "Webhook returned status 500: boom");
    }
}
