use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConformanceError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected status for {method} {url}: expected {expected}, got {actual}")]
    UnexpectedStatus {
        method: String,
        url: String,
        expected: String,
        actual: u16,
    },

    #[error("Assertion failed: {0}")]
    Assertion(String),

    #[error("Missing field '{field}' in response from {url}")]
    MissingField { field: String, url: String },

    #[error("Authentication failed for user: {username}")]
    Authentication { username: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Datastore error: {0}")]
    Datastore(String),

    #[error("Timeout error: operation timed out after {timeout_seconds} seconds")]
    Timeout { timeout_seconds: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConformanceError {
    /// Shorthand for a failed expectation
    pub fn assertion(message: impl Into<String>) -> Self {
        ConformanceError::Assertion(message.into())
    }

    /// True when the error reports a check that ran and did not hold,
    /// as opposed to the harness failing to run it
    pub fn is_assertion(&self) -> bool {
        matches!(
            self,
            ConformanceError::Assertion(_)
                | ConformanceError::UnexpectedStatus { .. }
                | ConformanceError::MissingField { .. }
        )
    }
}

#[cfg(feature = "mongo")]
impl From<mongodb::error::Error> for ConformanceError {
    fn from(err: mongodb::error::Error) -> Self {
        ConformanceError::Datastore(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConformanceError>;
