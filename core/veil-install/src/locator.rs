//! Manifest locator normalization.
//!
//! The catalog hands out the install manifest location in several forms.
//! They are tried in a fixed order; the first that applies wins:
//!
//! 1. absolute `http(s)` URL: used as is
//! 2. path starting with `/`: origin prepended
//! 3. JSON envelope `{"iv", "data"}`: decrypted to the real URL
//! 4. anything containing the signed-download path: origin prepended unless
//!    already absolute
//! 5. `<iv-hex>/<data-hex>`: rebuilt as a signed-download path
//! 6. anything else: returned unchanged
//!
//! Resolution never fails. An envelope that does not decrypt to a usable
//! string falls through to the later rules.

use crate::config::InstallConfig;
use tracing::{debug, warn};
use veil_crypto::{Envelope, EnvelopeCodec, validate_format};

/// Which rule produced a resolved URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorKind {
    Absolute,
    OriginRelative,
    Envelope,
    SignedPath,
    HexPair,
    /// No rule matched; the input is passed through and may not open.
    Unrecognized,
}

/// A resolved manifest location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    pub url: String,
    pub kind: LocatorKind,
}

/// Turns manifest locators into absolute URLs.
#[derive(Debug, Clone)]
pub struct LinkResolver {
    config: InstallConfig,
    codec: EnvelopeCodec,
}

fn is_absolute(locator: &str) -> bool {
    let head: String = locator.chars().take(8).collect::<String>().to_ascii_lowercase();
    head.starts_with("http://") || head.starts_with("https://")
}

impl LinkResolver {
    pub fn new(mut config: InstallConfig, codec: EnvelopeCodec) -> Self {
        let trimmed = config.origin.trim_end_matches('/').len();
        config.origin.truncate(trimmed);
        Self { config, codec }
    }

    pub fn config(&self) -> &InstallConfig {
        &self.config
    }

    /// Resolves `locator` to an absolute URL where possible.
    pub fn resolve(&self, locator: &str) -> ResolvedLink {
        let locator = locator.trim();
        let resolved = |url: String, kind| ResolvedLink { url, kind };

        if is_absolute(locator) {
            return resolved(locator.to_string(), LocatorKind::Absolute);
        }
        if locator.starts_with('/') {
            return resolved(self.with_origin(locator), LocatorKind::OriginRelative);
        }
        if let Some(url) = self.open_envelope(locator) {
            return resolved(url, LocatorKind::Envelope);
        }
        if locator.contains(self.config.signed_path.as_str()) {
            return resolved(self.with_origin(locator), LocatorKind::SignedPath);
        }
        if let Some((iv, data)) = Self::hex_pair(locator) {
            let path = format!("{}{iv}/{data}", self.config.signed_path);
            return resolved(self.with_origin(&path), LocatorKind::HexPair);
        }

        debug!(locator, "unrecognized manifest locator, passing through");
        resolved(locator.to_string(), LocatorKind::Unrecognized)
    }

    fn with_origin(&self, path: &str) -> String {
        if is_absolute(path) {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{path}", self.config.origin)
        } else {
            format!("{}/{path}", self.config.origin)
        }
    }

    fn open_envelope(&self, locator: &str) -> Option<String> {
        if !locator.starts_with('{') {
            return None;
        }
        let envelope: Envelope = serde_json::from_str(locator).ok()?;
        match self.codec.open(&envelope) {
            Ok(plain) => {
                let url = plain.trim();
                if url.is_empty() {
                    warn!("manifest envelope decrypted to an empty string");
                    None
                } else {
                    Some(url.to_string())
                }
            }
            Err(e) => {
                warn!(error = %e, "manifest envelope did not decrypt");
                None
            }
        }
    }

    /// Splits `<iv>/<data>` where both halves are non-empty hex.
    fn hex_pair(locator: &str) -> Option<(&str, &str)> {
        let (iv, data) = locator.split_once('/')?;
        if iv.is_empty() || data.is_empty() || data.contains('/') {
            return None;
        }
        validate_format(data, iv).ok()?;
        Some((iv, data))
    }
}
