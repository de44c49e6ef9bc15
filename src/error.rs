//! Error types for the BattleZips client core

use thiserror::Error;

use crate::wallet::provider::ProviderError;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the client core
#[derive(Error, Debug)]
pub enum Error {
    // Wallet session errors
    #[error("Wallet connection aborted: {0}")]
    ConnectionAborted(String),

    #[error("Network not supported, please switch to {required}")]
    NetworkMismatch { required: String },

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // Proof pipeline errors
    #[error("Failed to fetch proof asset {locator}: {reason}")]
    AssetFetch { locator: String, reason: String },

    #[error("Proof execution failed: {0}")]
    ProofExecution(String),

    #[error("Unsupported proof kind: {0}")]
    UnsupportedProofKind(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if the failed operation may be re-invoked from scratch
    ///
    /// Nothing in this crate retries on its own; this only classifies.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::AssetFetch { .. } | Error::ProofExecution(_))
    }

    /// Check if this error left the wallet session disconnected
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            Error::ConnectionAborted(_) | Error::NetworkMismatch { .. } | Error::Provider(_)
        )
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

// Conversion from config errors
impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Config(e.to_string())
    }
}
