//! Common error types for checkmon components.

use std::fmt;

/// A specialized Result type for checkmon operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for checkmon operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Check error: {0}")]
    Check(String),

    #[error("Notification error: {0}")]
    Notify(String),

    #[error(transparent)]
    MultiNotify(#[from] MultiError),

    #[error("State error: {0}")]
    State(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown error: {0}")]
    Other(String),
}

impl Error {
    /// Create a new check execution error.
    pub fn check(msg: impl fmt::Display) -> Self {
        Error::Check(msg.to_string())
    }

    /// Create a new notification error.
    pub fn notify(msg: impl fmt::Display) -> Self {
        Error::Notify(msg.to_string())
    }

    /// Create a new state store error.
    pub fn state(msg: impl fmt::Display) -> Self {
        Error::State(msg.to_string())
    }

    /// Create a new configuration error.
    pub fn config(msg: impl fmt::Display) -> Self {
        Error::Config(msg.to_string())
    }

    /// Create a new other error.
    pub fn other(msg: impl fmt::Display) -> Self {
        Error::Other(msg.to_string())
    }
}

/// Aggregated failures from fanning an alert out to multiple
/// notification transports. Every transport is attempted; each failure
/// is collected here.
#[derive(Debug)]
pub struct MultiError {
    pub errors: Vec<Error>,
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "multiple notification errors: ")?;
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}
