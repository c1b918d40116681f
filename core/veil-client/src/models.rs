//! Wire models returned by the catalog service.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use veil_types::AppId;

/// An application listed in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerApp {
    #[serde(deserialize_with = "app_id")]
    pub id: AppId,
    pub name: String,
    pub version: String,
    pub icon: String,
    /// Package download URL.
    #[serde(default)]
    pub pkg: Option<String>,
    /// Manifest locator; see `veil-install` for the accepted forms.
    #[serde(default)]
    pub plist: Option<String>,
    /// Whether installing requires an unlock. Sent as `1`/`0`.
    #[serde(default, deserialize_with = "flag")]
    pub requires_key: bool,
}

/// One server-side grant for a device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    /// The application unlocked, or `None` for every application.
    #[serde(default, deserialize_with = "optional_id")]
    pub app_id: Option<String>,
}

impl Binding {
    /// Returns true if this grant unlocks every application.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.app_id.is_none()
    }

    /// Returns true if this grant unlocks `app`.
    #[must_use]
    pub fn covers(&self, app: &AppId) -> bool {
        match &self.app_id {
            None => true,
            Some(id) => id == app.as_str(),
        }
    }
}

/// Server-side binding state of a device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingStatus {
    #[serde(default)]
    pub bound: bool,
    #[serde(default)]
    pub bindings: Vec<Binding>,
}

impl BindingStatus {
    /// Status of a device the server knows nothing about.
    #[must_use]
    pub fn unbound() -> Self {
        Self::default()
    }

    /// Returns true if the device is bound and some grant covers `app`.
    #[must_use]
    pub fn grants(&self, app: &AppId) -> bool {
        self.bound && self.bindings.iter().any(|b| b.covers(app))
    }

    /// Returns true if the device holds a grant for every application.
    #[must_use]
    pub fn has_wildcard(&self) -> bool {
        self.bound && self.bindings.iter().any(Binding::is_wildcard)
    }
}

/// Result of a card-key redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyOutcome {
    pub success: bool,
    pub message: Option<String>,
    /// Manifest link returned on success, if any.
    pub plist: Option<String>,
}

impl VerifyOutcome {
    /// Message used when the server confirms without saying anything.
    pub const DEFAULT_SUCCESS_MESSAGE: &'static str = "card key verified";

    /// The value to hand back to the caller: the manifest link when present,
    /// otherwise the server's message.
    #[must_use]
    pub fn payload(&self) -> Option<&str> {
        self.plist.as_deref().or(self.message.as_deref())
    }

    /// A manifest link carried either in `plist` or in the message.
    #[must_use]
    pub fn manifest_link(&self) -> Option<&str> {
        self.plist
            .as_deref()
            .or_else(|| self.message.as_deref().filter(|m| m.contains(".plist")))
    }
}

fn app_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<AppId, D::Error> {
    let raw = match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        other => return Err(de::Error::custom(format!("invalid application id: {other}"))),
    };
    AppId::new(raw).map_err(de::Error::custom)
}

/// Only `null` (or an absent field) means "every application".
fn optional_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(de::Error::custom(format!("invalid binding app id: {other}"))),
    }
}

fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => matches!(s.as_str(), "1" | "true"),
        _ => false,
    })
}
