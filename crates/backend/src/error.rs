//! Backend client errors.

use thiserror::Error;

/// Failure of a single round trip to the hosted backend.
///
/// Callers care about one distinction: the backend *answered* with a refusal
/// (`Http`, carrying the provider's own message) versus the query itself
/// failing (`Transport`/`Decode`). "Row not found" is never an error — store
/// methods return `Ok(None)`/`Ok(false)` for that.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The backend responded with a non-success status.
    #[error("{message}")]
    Http { status: u16, message: String },

    /// The request never completed (connection, DNS, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The response arrived but could not be interpreted.
    #[error("unexpected response shape: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// The message to surface to callers (for `Http`, the provider's own).
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
