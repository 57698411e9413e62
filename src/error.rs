//! dbrelay Error Types

use thiserror::Error;

/// Result type alias for dbrelay operations
pub type Result<T> = std::result::Result<T, Error>;

/// dbrelay error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // Request errors
    #[error("{0}")]
    Validation(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to {action}: {reason}")]
    LocalExecution { action: String, reason: String },

    // Role errors
    #[error("Not primary: current primary is {0}")]
    NotPrimary(String),

    // Replication errors
    #[error("Replication queue closed")]
    QueueClosed,

    #[error("Replica {address} rejected request with status {status}")]
    ReplicaRejected { address: String, status: u16 },

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Connection failed to {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("Connection timeout to {0}")]
    ConnectionTimeout(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Network(e.to_string())
    }
}

impl Error {
    /// Check if this error came from talking to a peer node.
    ///
    /// These never reach the client whose write triggered the delivery; the
    /// only visible effect is the peer being marked unhealthy.
    pub fn is_delivery_failure(&self) -> bool {
        matches!(
            self,
            Error::Network(_)
                | Error::ConnectionFailed { .. }
                | Error::ConnectionTimeout(_)
                | Error::ReplicaRejected { .. }
        )
    }

    /// Check if this error is the caller's fault
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}
