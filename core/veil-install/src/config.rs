//! Install link configuration.

use crate::error::{InstallError, InstallResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    /// Origin prepended to relative manifest paths. No trailing slash.
    pub origin: String,
    /// Scheme of the platform install trigger.
    pub scheme: String,
    /// Path prefix of signed manifest downloads.
    pub signed_path: String,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            origin: "https://renmai.cloudmantoub.online".to_string(),
            scheme: "itms-services".to_string(),
            signed_path: "/api/plist/".to_string(),
        }
    }
}

impl InstallConfig {
    /// Loads a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: &Path) -> InstallResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| InstallError::Config(format!("{}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| InstallError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> InstallResult<()> {
        let lower = self.origin.to_ascii_lowercase();
        if !(lower.starts_with("http://") || lower.starts_with("https://")) {
            return Err(InstallError::Config(format!(
                "origin must be an http(s) URL: {:?}",
                self.origin
            )));
        }
        let scheme_char = |b: u8| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'+' | b'.');
        if self.scheme.is_empty() || !self.scheme.bytes().all(scheme_char) {
            return Err(InstallError::Config(format!("invalid trigger scheme {:?}", self.scheme)));
        }
        if !self.signed_path.starts_with('/') || !self.signed_path.ends_with('/') {
            return Err(InstallError::Config(format!(
                "signed path must start and end with '/': {:?}",
                self.signed_path
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = InstallConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheme, "itms-services");
    }

    #[test]
    fn partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("install.json");
        std::fs::write(&path, r#"{"origin": "http://localhost:8080/"}"#).unwrap();
        let config = InstallConfig::from_json_file(&path).unwrap();
        assert_eq!(config.origin, "http://localhost:8080/");
        assert_eq!(config.signed_path, "/api/plist/");
    }

    #[test]
    fn rejects_bad_values() {
        let bad_origin = InstallConfig {
            origin: "renmai.cloudmantoub.online".into(),
            ..InstallConfig::default()
        };
        assert!(bad_origin.validate().is_err());

        let bad_scheme = InstallConfig {
            scheme: "itms services".into(),
            ..InstallConfig::default()
        };
        assert!(bad_scheme.validate().is_err());
    }
}
