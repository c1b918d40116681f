//! Error types for disguise checks.

use thiserror::Error;
use veil_client::ClientError;
use veil_crypto::CryptoError;
use veil_storage::StorageError;

/// Disguise check errors.
///
/// Callers of [`DisguiseEngine::decide`](crate::DisguiseEngine::decide) never
/// see the network variants: those are folded into a fail-safe or fallback
/// decision. They surface only from the lower-level check methods.
#[derive(Debug, Error)]
pub enum DisguiseError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("envelope error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The server answered 200 but without a usable verdict.
    #[error("malformed disguise response: {0}")]
    Malformed(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl DisguiseError {
    /// Returns true for failures that mean "the check server could not be
    /// reached at all" (timeout or refused connection).
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            Self::Client(ClientError::Timeout(_) | ClientError::Unreachable(_))
        )
    }

    /// Returns true if the server refused this device (HTTP 401 or 403).
    #[must_use]
    pub fn is_refused(&self) -> bool {
        matches!(self, Self::Client(ClientError::Status(401 | 403)))
    }
}

/// Result type for disguise operations.
pub type DisguiseResult<T> = Result<T, DisguiseError>;
