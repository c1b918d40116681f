//! Envelope shape and structural detection.
//!
//! Detection is purely structural: an object is an envelope if it has
//! exactly two members, `iv` and `data`, both strings. Nothing about the
//! contents is checked until decryption.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An encrypted payload as it appears on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Hex-encoded 16-byte IV.
    pub iv: String,
    /// Hex-encoded ciphertext.
    pub data: String,
}

impl Envelope {
    /// Recognizes an envelope in a JSON value.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        if object.len() != 2 {
            return None;
        }
        let iv = object.get("iv")?.as_str()?;
        let data = object.get("data")?.as_str()?;
        Some(Self {
            iv: iv.to_string(),
            data: data.to_string(),
        })
    }

    /// Recognizes an envelope serialized as a JSON string.
    #[must_use]
    pub fn from_json_str(raw: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(raw.trim()).ok()?;
        Self::from_value(&value)
    }

    /// Returns the envelope as a JSON object.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::json!({ "iv": self.iv, "data": self.data })
    }
}

/// Where in a response an envelope was found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvelopeLocation {
    /// `response.data` is the envelope.
    Data,
    /// `response.data.data` is the envelope.
    NestedData,
}

/// Looks for an envelope under a response's top-level `data` member, then
/// one level deeper.
#[must_use]
pub fn locate(response: &Value) -> Option<(EnvelopeLocation, Envelope)> {
    let data = response.get("data")?;
    if let Some(envelope) = Envelope::from_value(data) {
        return Some((EnvelopeLocation::Data, envelope));
    }
    let nested = data.get("data")?;
    Envelope::from_value(nested).map(|envelope| (EnvelopeLocation::NestedData, envelope))
}
