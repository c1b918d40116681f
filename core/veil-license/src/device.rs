//! Device identity.
//!
//! The identifier sent to the server as `udid` is resolved in a fixed order
//! and persisted on first use:
//!
//! 1. the canonical key ([`keys::DEVICE_ID`]);
//! 2. the legacy key ([`keys::LEGACY_DEVICE_ID`]), copied to the canonical
//!    key on first read;
//! 3. a stable platform identifier, if the host provides one;
//! 4. a freshly generated UUID.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::env;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};
use uuid::Uuid;
use veil_storage::{KeyValueStore, keys};
use veil_types::{DeviceId, IdentityProvider};

use crate::error::EntitlementResult;

/// Host facts reported alongside the device identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// `std::env::consts::OS`.
    pub os_name: String,
    /// OS release, or `unknown`.
    pub os_version: String,
    /// Hostname.
    pub hostname: String,
    /// CPU architecture.
    pub arch: String,
}

impl DeviceInfo {
    /// Reads the facts from the running host.
    #[must_use]
    pub fn collect() -> Self {
        Self {
            os_name: env::consts::OS.to_string(),
            os_version: host::os_version(),
            hostname: host::name(),
            arch: env::consts::ARCH.to_string(),
        }
    }

    /// Model string reported to the server, e.g. `linux-x86_64`.
    #[must_use]
    pub fn model(&self) -> String {
        format!("{}-{}", self.os_name, self.arch)
    }
}

/// Source of a stable, platform-assigned device identifier.
pub trait PlatformIdentifier: Send + Sync {
    /// Returns the identifier, or `None` if the platform has none.
    fn platform_id(&self) -> Option<String>;
}

/// Derives a UUID-formatted identifier from hashed hardware identifiers.
///
/// Stable across restarts; changes if the machine ID or hostname changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct MachineIdentifier;

impl PlatformIdentifier for MachineIdentifier {
    fn platform_id(&self) -> Option<String> {
        let machine_id = host::machine_id()?;
        let components = [
            env::consts::OS.to_string(),
            env::consts::ARCH.to_string(),
            host::name(),
            machine_id,
        ];

        let hash = Sha256::digest(components.join("|").as_bytes());
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&hash[..16]);
        Some(Uuid::from_bytes(bytes).hyphenated().to_string().to_uppercase())
    }
}

/// Platform without a stable identifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPlatformIdentifier;

impl PlatformIdentifier for NoPlatformIdentifier {
    fn platform_id(&self) -> Option<String> {
        None
    }
}

/// Resolves and persists the device identifier.
pub struct DeviceIdentity {
    store: Arc<dyn KeyValueStore>,
    platform: Arc<dyn PlatformIdentifier>,
    // Used only if the store is unusable, so the id is at least stable for
    // the life of the process.
    volatile: OnceLock<DeviceId>,
}

impl DeviceIdentity {
    pub fn new(store: Arc<dyn KeyValueStore>, platform: Arc<dyn PlatformIdentifier>) -> Self {
        Self {
            store,
            platform,
            volatile: OnceLock::new(),
        }
    }

    fn read(&self, key: &str) -> EntitlementResult<Option<DeviceId>> {
        Ok(self
            .store
            .get_string(key)?
            .and_then(|raw| DeviceId::new(raw).ok()))
    }

    /// Returns the device identifier, creating and persisting it on first
    /// use.
    ///
    /// # Errors
    ///
    /// Fails only if the store cannot be read or written.
    pub fn resolve(&self) -> EntitlementResult<DeviceId> {
        if let Some(id) = self.read(keys::DEVICE_ID)? {
            return Ok(id);
        }

        if let Some(id) = self.read(keys::LEGACY_DEVICE_ID)? {
            self.store.set_string(keys::DEVICE_ID, id.as_str())?;
            info!(udid = %id, "migrated device identifier from legacy key");
            return Ok(id);
        }

        let id = match self.platform.platform_id().and_then(|raw| DeviceId::new(raw).ok()) {
            Some(id) => {
                debug!("using platform identifier as device identifier");
                id
            }
            None => DeviceId::generate(),
        };
        self.store.set_string(keys::DEVICE_ID, id.as_str())?;
        info!(udid = %id, "created device identifier");
        Ok(id)
    }

    /// Replaces the device identifier with a user-supplied value.
    pub fn save_custom(&self, id: &DeviceId) -> EntitlementResult<()> {
        self.store.set_string(keys::DEVICE_ID, id.as_str())?;
        self.store.set_string(keys::LEGACY_DEVICE_ID, id.as_str())?;
        info!(udid = %id, "saved custom device identifier");
        Ok(())
    }

    /// Forgets any stored identifier. The next [`resolve`](Self::resolve)
    /// falls back to the platform identifier.
    pub fn clear_custom(&self) -> EntitlementResult<()> {
        self.store.remove(keys::DEVICE_ID)?;
        self.store.remove(keys::LEGACY_DEVICE_ID)?;
        info!("cleared custom device identifier");
        Ok(())
    }

    /// Returns true if a user-supplied identifier is stored.
    pub fn has_custom(&self) -> EntitlementResult<bool> {
        Ok(self.read(keys::LEGACY_DEVICE_ID)?.is_some())
    }
}

impl IdentityProvider for DeviceIdentity {
    fn device_id(&self) -> DeviceId {
        match self.resolve() {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "device identifier store unavailable");
                self.volatile
                    .get_or_init(|| {
                        self.platform
                            .platform_id()
                            .and_then(|raw| DeviceId::new(raw).ok())
                            .unwrap_or_else(DeviceId::generate)
                    })
                    .clone()
            }
        }
    }
}

mod host {
    use std::process::Command;

    const UNKNOWN: &str = "unknown";

    fn command_stdout(program: &str, args: &[&str]) -> Option<String> {
        let output = Command::new(program).args(args).output().ok()?;
        output.status.success().then_some(())?;
        String::from_utf8(output.stdout).ok()
    }

    fn first_readable(paths: &[&str]) -> Option<String> {
        paths.iter().find_map(|p| std::fs::read_to_string(p).ok())
    }

    /// Value of `key` in an `os-release` style `KEY="value"` file.
    pub(super) fn release_field(content: &str, key: &str) -> Option<String> {
        content.lines().find_map(|line| {
            let (k, v) = line.split_once('=')?;
            (k.trim() == key).then(|| v.trim().trim_matches('"').to_string())
        })
    }

    pub(super) fn name() -> String {
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    pub(super) fn os_version() -> String {
        let version = if cfg!(target_os = "macos") {
            command_stdout("sw_vers", &["-productVersion"]).map(|v| v.trim().to_string())
        } else if cfg!(target_os = "linux") {
            first_readable(&["/etc/os-release", "/usr/lib/os-release"])
                .and_then(|content| release_field(&content, "VERSION_ID"))
        } else {
            None
        };
        version
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    /// Hardware or install identifier assigned by the OS.
    pub(super) fn machine_id() -> Option<String> {
        let raw = if cfg!(target_os = "macos") {
            command_stdout("ioreg", &["-rd1", "-c", "IOPlatformExpertDevice"]).and_then(|out| {
                out.lines()
                    .filter(|l| l.contains("IOPlatformUUID"))
                    .find_map(|l| l.rsplit('=').next())
                    .map(|v| v.trim().trim_matches('"').to_string())
            })
        } else if cfg!(target_os = "linux") {
            first_readable(&["/etc/machine-id", "/var/lib/dbus/machine-id"])
        } else {
            None
        };
        raw.map(|id| id.trim().to_string()).filter(|id| !id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::host::release_field;

    #[test]
    fn release_field_strips_quotes() {
        let content = "NAME=\"Fedora Linux\"\nVERSION_ID=41\nPRETTY_NAME=\"Fedora 41\"\n";
        assert_eq!(release_field(content, "VERSION_ID").as_deref(), Some("41"));
        assert_eq!(release_field(content, "NAME").as_deref(), Some("Fedora Linux"));
        assert_eq!(release_field(content, "ID"), None);
    }
}
