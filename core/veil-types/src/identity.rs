//! Device identity seam.

use crate::DeviceId;

/// Supplies the persisted device identifier.
///
/// Implementations must be idempotent: repeated calls return the same value
/// unless the identifier is explicitly changed by the user.
pub trait IdentityProvider: Send + Sync {
    /// Returns the device identifier, creating and persisting it on first use.
    fn device_id(&self) -> DeviceId;
}

/// Identity provider that always returns the same identifier.
#[derive(Debug, Clone)]
pub struct FixedIdentity(DeviceId);

impl FixedIdentity {
    #[must_use]
    pub fn new(id: DeviceId) -> Self {
        Self(id)
    }
}

impl IdentityProvider for FixedIdentity {
    fn device_id(&self) -> DeviceId {
        self.0.clone()
    }
}
