//! Error types for todaytasks-core

use thiserror::Error;

/// Main error type for the todaytasks-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Translation table could not be loaded
    #[error("translation error: {0}")]
    Translation(String),

    /// Remote service answered with a non-success status
    #[error("HTTP error: {status}")]
    Http { status: u16 },

    /// Request never produced a response (DNS, connect, timeout)
    #[error("network error: {0}")]
    Network(String),

    /// Tracker session is missing or unreadable
    #[error("session error: {0}")]
    Session(String),
}

/// Result type alias for todaytasks-core
pub type Result<T> = std::result::Result<T, Error>;

/// Failure modes of a single external fetch.
///
/// Each variant maps to its own sticky notice so the user can tell an expired
/// login apart from a flaky network.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// No stored session; permanent until the user logs in again
    #[error("no tracker session stored")]
    MissingSession,

    /// Session file exists but could not be parsed
    #[error("tracker session file is unreadable")]
    SessionUnreadable,

    /// 401/403 from the remote side
    #[error("authentication expired (HTTP {0})")]
    AuthExpired(u16),

    /// Any other non-success status
    #[error("HTTP {0}")]
    Http(u16),

    /// Transport failure or timeout
    #[error("network error: {0}")]
    Network(String),
}

impl FetchError {
    /// Classify an HTTP status that was not a success.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => FetchError::AuthExpired(status),
            other => FetchError::Http(other),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => FetchError::from_status(status.as_u16()),
            None => FetchError::Network(e.to_string()),
        }
    }
}

impl From<FetchError> for Error {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::MissingSession | FetchError::SessionUnreadable => {
                Error::Session(e.to_string())
            }
            FetchError::AuthExpired(status) | FetchError::Http(status) => Error::Http { status },
            FetchError::Network(msg) => Error::Network(msg),
        }
    }
}
