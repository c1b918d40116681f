//! Response body decoding.
//!
//! The service answers with `{success, data | message}` where `data` takes
//! several shapes depending on the endpoint and server version. Shapes are
//! tried in a fixed order; the first match wins:
//!
//! | Shape             | Matches when                                   |
//! |-------------------|------------------------------------------------|
//! | `PlainArray`      | the body, or its `data`, is an array           |
//! | `Enveloped`       | `data` is an envelope                          |
//! | `NestedEnveloped` | `data.data` is an envelope                     |
//! | `PlainObject`     | `data` is any other object                     |
//! | `SingleObject`    | no `data`, but the body itself carries an `id` |
//!
//! Envelopes are structurally plain objects too, so they must be tested
//! before `PlainObject`.

use crate::error::{ClientError, ClientResult};
use serde_json::{Map, Value};
use tracing::debug;
use veil_crypto::{EnvelopeCodec, EnvelopeLocation, locate};

/// Strips leading bytes that precede the JSON document.
///
/// Some server deployments emit a notice or BOM before the body. If the first
/// non-whitespace byte opens neither an object nor an array, everything
/// before the first `{` is dropped.
#[must_use]
pub fn clean_body(raw: &[u8]) -> &[u8] {
    let start = raw
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(raw.len());
    let trimmed = &raw[start..];
    match trimmed.first() {
        Some(b'{' | b'[') | None => trimmed,
        Some(_) => trimmed
            .iter()
            .position(|&b| b == b'{')
            .map_or(trimmed, |i| &trimmed[i..]),
    }
}

/// Parses a response body as JSON after [`clean_body`].
pub fn parse_body(raw: &[u8]) -> ClientResult<Value> {
    let cleaned = clean_body(raw);
    if cleaned.len() != raw.len() {
        debug!(skipped = raw.len() - cleaned.len(), "trimmed leading bytes from response");
    }
    serde_json::from_slice(cleaned).map_err(|e| ClientError::Malformed(e.to_string()))
}

/// A decoded response payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseShape {
    PlainArray(Vec<Value>),
    /// Decrypted contents of `data`.
    Enveloped(Value),
    /// Decrypted contents of `data.data`.
    NestedEnveloped(Value),
    PlainObject(Map<String, Value>),
    SingleObject(Map<String, Value>),
}

impl ResponseShape {
    /// Classifies a parsed body, decrypting an envelope if one is present.
    ///
    /// # Errors
    ///
    /// [`ClientError::Crypto`] if an envelope fails to decrypt or its
    /// plaintext is not JSON; [`ClientError::Malformed`] if no shape matches.
    pub fn classify(body: Value, codec: &EnvelopeCodec) -> ClientResult<Self> {
        // An array `data` never locates as an envelope, so this cannot
        // shadow `PlainArray`.
        if let Some((location, envelope)) = locate(&body) {
            let decrypted = codec.open_json(&envelope)?;
            return Ok(match location {
                EnvelopeLocation::Data => Self::Enveloped(decrypted),
                EnvelopeLocation::NestedData => Self::NestedEnveloped(decrypted),
            });
        }

        match body {
            Value::Array(items) => Ok(Self::PlainArray(items)),
            Value::Object(mut object) => match object.remove("data") {
                Some(Value::Array(items)) => Ok(Self::PlainArray(items)),
                Some(Value::Object(data)) => Ok(Self::PlainObject(data)),
                None if object.contains_key("id") => Ok(Self::SingleObject(object)),
                _ => Err(ClientError::Malformed("unrecognized response shape".into())),
            },
            _ => Err(ClientError::Malformed("response is not a JSON object".into())),
        }
    }

    /// Short name of the shape, for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PlainArray(_) => "plain-array",
            Self::Enveloped(_) => "enveloped",
            Self::NestedEnveloped(_) => "nested-enveloped",
            Self::PlainObject(_) => "plain-object",
            Self::SingleObject(_) => "single-object",
        }
    }

    /// Returns the payload as a single JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::PlainArray(items) => Value::Array(items),
            Self::Enveloped(value) | Self::NestedEnveloped(value) => value,
            Self::PlainObject(object) | Self::SingleObject(object) => Value::Object(object),
        }
    }

    /// Flattens the payload into a list of records.
    ///
    /// Decrypted payloads may themselves wrap their records in a `data`
    /// member; that wrapper is looked through.
    #[must_use]
    pub fn into_records(self) -> Vec<Value> {
        match self {
            Self::PlainArray(items) => items,
            Self::SingleObject(object) => vec![Value::Object(object)],
            Self::PlainObject(object) => unwrap_records(Value::Object(object)),
            Self::Enveloped(value) | Self::NestedEnveloped(value) => unwrap_records(value),
        }
    }
}

fn unwrap_records(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("data") {
            Some(Value::Array(items)) => items,
            Some(inner @ Value::Object(_)) => vec![inner],
            Some(other) => {
                object.insert("data".into(), other);
                vec![Value::Object(object)]
            }
            None => vec![Value::Object(object)],
        },
        _ => Vec::new(),
    }
}
