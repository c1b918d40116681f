//! Disguise check response parsing.
//!
//! The check endpoint answers in one of two forms:
//!
//! ```text
//! {"success": true, "data": {"disguise_enabled": false, "expiration_time": 1700000300}}
//! {"success": true, "data": {"iv": "<hex>", "data": "<hex>"}}
//! ```
//!
//! An envelope decrypts to the same fields, either at its top level or under
//! its own `data` member. The `success` flag is only required on the plain
//! form.

use crate::error::{DisguiseError, DisguiseResult};
use serde_json::Value;
use veil_crypto::{EnvelopeCodec, locate};
use veil_types::Timestamp;

/// What the server decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub disguise_enabled: bool,
    /// Absolute expiry sent by the server, if any.
    pub expires_at: Option<Timestamp>,
}

impl Verdict {
    /// Extracts a verdict from a parsed response body.
    ///
    /// # Errors
    ///
    /// [`DisguiseError::Crypto`] if an envelope fails to open,
    /// [`DisguiseError::Malformed`] if no verdict can be found.
    pub fn from_body(body: &Value, codec: &EnvelopeCodec) -> DisguiseResult<Self> {
        if let Some((_, envelope)) = locate(body) {
            let inner = codec.open_json(&envelope)?;
            let fields = if inner.get("disguise_enabled").is_some() {
                &inner
            } else {
                inner.get("data").unwrap_or(&inner)
            };
            return Self::from_fields(fields);
        }

        if body.get("success").and_then(Value::as_bool) != Some(true) {
            return Err(DisguiseError::Malformed("success flag missing or false".into()));
        }
        let data = body
            .get("data")
            .ok_or_else(|| DisguiseError::Malformed("no data member".into()))?;
        Self::from_fields(data)
    }

    fn from_fields(fields: &Value) -> DisguiseResult<Self> {
        let disguise_enabled = fields
            .get("disguise_enabled")
            .and_then(Value::as_bool)
            .ok_or_else(|| DisguiseError::Malformed("disguise_enabled missing".into()))?;
        let expires_at = match fields.get("expiration_time") {
            Some(Value::Number(n)) => n.as_f64().and_then(|s| Timestamp::from_secs_f64(s).ok()),
            Some(Value::String(s)) => Timestamp::parse(s).ok(),
            _ => None,
        };
        Ok(Self {
            disguise_enabled,
            expires_at,
        })
    }
}
