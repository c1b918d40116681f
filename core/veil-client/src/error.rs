//! Error types for the API client.

use thiserror::Error;
use veil_crypto::CryptoError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur talking to the remote service.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request did not complete within its timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The host could not be reached (DNS, refused connection, no route).
    #[error("host unreachable: {0}")]
    Unreachable(String),

    /// Any other transport failure.
    #[error("network error: {0}")]
    Transport(String),

    /// The server answered with a status other than 200.
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// The body could not be interpreted.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The server understood the request and refused it.
    #[error("rejected by server: {0}")]
    Rejected(String),

    /// An envelope could not be decrypted.
    #[error("envelope error: {0}")]
    Crypto(#[from] CryptoError),

    /// Invalid client configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON encoding/decoding error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// Returns true for failures below HTTP: timeouts, unreachable hosts and
    /// other transport errors.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Unreachable(_) | Self::Transport(_)
        )
    }

    /// Returns true for failures where the server answered but the answer was
    /// unusable.
    #[must_use]
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Self::Status(_) | Self::Malformed(_) | Self::Rejected(_) | Self::Serialization(_)
        )
    }

    /// Returns true if repeating the same request might succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.is_transport() || matches!(self, Self::Status(_))
    }

    /// Returns true if this failure should count against the endpoint that
    /// served it.
    #[must_use]
    pub fn counts_against_endpoint(&self) -> bool {
        self.is_transport() || self.is_protocol() || matches!(self, Self::Crypto(_))
    }

    /// Returns the HTTP status, if the failure carries one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status(code) => Some(*code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_connect() {
            Self::Unreachable(e.to_string())
        } else if let Some(status) = e.status() {
            Self::Status(status.as_u16())
        } else if e.is_decode() {
            Self::Malformed(e.to_string())
        } else if e.is_builder() {
            Self::Config(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}
