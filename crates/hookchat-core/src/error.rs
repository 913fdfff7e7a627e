//! Error types for hookchat-core

use thiserror::Error;

/// Result type alias using hookchat-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the widget runtime
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the wire layer (transport, status, timeout, abort)
    #[error(transparent)]
    Wire(#[from] hookchat_wire::Error),

    /// The surface already hosts a widget
    #[error("A chat widget is already mounted on this surface")]
    AlreadyMounted,

    /// History or session-id storage failed
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Stored data could not be (de)serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Whether this failure should be reported with the connection-error label
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Wire(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Whether the session was cancelled by the host
    pub fn is_aborted(&self) -> bool {
        match self {
            Error::Wire(e) => e.is_aborted(),
            _ => false,
        }
    }
}
