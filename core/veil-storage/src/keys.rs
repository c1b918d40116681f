//! Well-known persisted keys.

/// Canonical device identifier.
pub const DEVICE_ID: &str = "deviceUDID";

/// Device identifier written by older clients; migrated to [`DEVICE_ID`].
pub const LEGACY_DEVICE_ID: &str = "custom_device_udid";

/// Cached disguise flag (`true` = keep the decoy).
pub const DISGUISE_ENABLED: &str = "disguise_mode_enabled";

/// Epoch seconds at which the cached disguise flag expires.
pub const DISGUISE_EXPIRATION: &str = "disguise_mode_expiration";

/// Epoch seconds of the last disguise check.
pub const LAST_DISGUISE_CHECK: &str = "last_disguise_check_time";

const UNLOCK_PREFIX: &str = "app_unlocked_";

/// Key of the local unlock flag for one application.
#[must_use]
pub fn app_unlocked(app_id: &str) -> String {
    format!("{UNLOCK_PREFIX}{app_id}")
}
