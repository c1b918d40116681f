//! Error types for install triggering.

use thiserror::Error;
use veil_crypto::CryptoError;
use veil_storage::StorageError;

#[derive(Debug, Error)]
pub enum InstallError {
    /// The application has no manifest locator to install from.
    #[error("no install manifest for app {0}")]
    MissingManifest(String),

    /// The platform refused or failed to open a URL.
    #[error("failed to open URL: {0}")]
    Open(String),

    #[error("envelope error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type InstallResult<T> = Result<T, InstallError>;
