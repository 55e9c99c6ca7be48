//! Error types for Stagehand

use std::time::Duration;
use thiserror::Error;

/// Result type alias for Stagehand operations
pub type Result<T> = std::result::Result<T, StagehandError>;

/// Main error type for Stagehand operations
///
/// Unknown backdoor keys are not represented here: the dispatcher answers
/// them with a sentinel string instead.
#[derive(Error, Debug)]
pub enum StagehandError {
    #[error("Failed to bind test server on {addr}: {message}")]
    Bind { addr: String, message: String },

    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Test server is already started")]
    AlreadyStarted,

    #[error("Test server was stopped and cannot be restarted")]
    ServerStopped,

    #[error("Port {port} was not released after the server stopped")]
    PortNotReleased { port: u16 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Timed out after {waited:?} waiting for: {expected}")]
    Timeout { expected: String, waited: Duration },

    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("Backdoor invocation failed: {0}")]
    Invocation(String),

    #[error("No scenario object registered as '{0}'")]
    UnknownObject(String),

    #[error("Scenario object '{0}' has a different type")]
    ObjectTypeMismatch(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for StagehandError {
    fn from(e: reqwest::Error) -> Self {
        StagehandError::Request(e.to_string())
    }
}

impl StagehandError {
    /// True for the timing category: a bounded wait ran out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, StagehandError::Timeout { .. })
    }
}
