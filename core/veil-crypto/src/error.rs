//! Error types for the envelope codec.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in envelope operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Input is not a hex string, or has an odd number of digits.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Decryption failed (bad block length or cipher setup).
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Invalid key length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Invalid IV length.
    #[error("invalid iv length: expected {expected}, got {actual}")]
    InvalidIvLength { expected: usize, actual: usize },

    /// Decrypted payload was expected to be JSON and was not.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
