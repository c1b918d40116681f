//! Core type definitions for the Veil client.
//!
//! This crate defines the small, dependency-free vocabulary shared by every
//! other crate in the workspace:
//! - Application and device identifiers
//! - Second-resolution timestamps and an injectable [`Clock`]
//! - The [`IdentityProvider`] seam through which services obtain the
//!   persisted device identifier without depending on how it is resolved

mod identity;
mod ids;
mod timestamp;

pub use identity::{FixedIdentity, IdentityProvider};
pub use ids::{AppId, DeviceId};
pub use timestamp::{Clock, ManualClock, SystemClock, Timestamp};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
