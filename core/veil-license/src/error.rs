//! Error types for the entitlement module.

use thiserror::Error;
use veil_client::ClientError;
use veil_storage::StorageError;

/// Entitlement-specific errors.
#[derive(Debug, Error)]
pub enum EntitlementError {
    /// The server refused the card key. Carries the server's message, suitable
    /// for showing to the user before asking for another key.
    #[error("verification rejected: {0}")]
    Rejected(String),

    /// Network or protocol failure talking to the server.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Local state could not be read or written.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// An identifier failed validation.
    #[error("invalid identifier: {0}")]
    Identity(#[from] veil_types::Error),
}

impl EntitlementError {
    /// Returns true if the user should be offered another card-key attempt.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

/// Result type for entitlement operations.
pub type EntitlementResult<T> = Result<T, EntitlementError>;
