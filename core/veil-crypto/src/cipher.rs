//! AES-256-CBC envelope encryption.
//!
//! Padding is applied with PKCS7 on the way out but removed by hand on the
//! way in, so that payloads produced by servers with sloppy padding still
//! decode.

use crate::envelope::Envelope;
use crate::error::{CryptoError, CryptoResult};
use crate::key::EnvelopeKey;
use cbc::cipher::block_padding::{NoPadding, Pkcs7};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use tracing::warn;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Size of the IV in bytes.
pub const IV_SIZE: usize = 16;

/// AES block size in bytes; also the largest valid PKCS7 pad value.
pub const BLOCK_SIZE: usize = 16;

/// Returns true if every character of `s` is a hex digit.
///
/// The empty string passes; length checks happen after decoding.
#[must_use]
pub fn is_hex(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Checks that both halves of an envelope are hex strings.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidFormat`] naming the offending field.
pub fn validate_format(ciphertext_hex: &str, iv_hex: &str) -> CryptoResult<()> {
    if !is_hex(ciphertext_hex) {
        return Err(CryptoError::InvalidFormat("ciphertext is not hex".into()));
    }
    if !is_hex(iv_hex) {
        return Err(CryptoError::InvalidFormat("iv is not hex".into()));
    }
    Ok(())
}

/// Encrypts `plaintext` under `key` with a fresh random IV.
pub fn encrypt(key: &EnvelopeKey, plaintext: &[u8]) -> CryptoResult<Envelope> {
    let mut iv = [0u8; IV_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut iv);

    let cipher = Aes256CbcEnc::new_from_slices(key.as_bytes(), &iv)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    Ok(Envelope {
        iv: hex::encode(iv),
        data: hex::encode(ciphertext),
    })
}

/// Decrypts a hex ciphertext with a hex IV.
///
/// Valid PKCS7 padding is stripped. If the padding is invalid, or the
/// unpadded bytes are not UTF-8, the full decrypted block sequence is
/// returned decoded lossily instead of failing.
///
/// # Errors
///
/// Fails on non-hex input, an IV that is not 16 bytes, or a ciphertext whose
/// length is not a multiple of the block size.
pub fn decrypt(key: &EnvelopeKey, ciphertext_hex: &str, iv_hex: &str) -> CryptoResult<String> {
    validate_format(ciphertext_hex, iv_hex)?;

    let iv = hex::decode(iv_hex)
        .map_err(|e| CryptoError::InvalidFormat(format!("iv: {e}")))?;
    if iv.len() != IV_SIZE {
        return Err(CryptoError::InvalidIvLength {
            expected: IV_SIZE,
            actual: iv.len(),
        });
    }
    let ciphertext = hex::decode(ciphertext_hex)
        .map_err(|e| CryptoError::InvalidFormat(format!("ciphertext: {e}")))?;
    if ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::Decryption(format!(
            "ciphertext length {} is not a multiple of {BLOCK_SIZE}",
            ciphertext.len()
        )));
    }

    let cipher = Aes256CbcDec::new_from_slices(key.as_bytes(), &iv)
        .map_err(|e| CryptoError::Decryption(e.to_string()))?;
    let raw = cipher
        .decrypt_padded_vec_mut::<NoPadding>(&ciphertext)
        .map_err(|e| CryptoError::Decryption(e.to_string()))?;

    if let Some(unpadded) = strip_pkcs7(&raw) {
        if let Ok(text) = std::str::from_utf8(unpadded) {
            return Ok(text.to_string());
        }
    }

    warn!(
        len = raw.len(),
        "envelope padding invalid, returning raw plaintext"
    );
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// Returns `bytes` without its PKCS7 padding, or `None` if the padding is
/// malformed.
fn strip_pkcs7(bytes: &[u8]) -> Option<&[u8]> {
    let &pad = bytes.last()?;
    let pad = usize::from(pad);
    if pad == 0 || pad > BLOCK_SIZE || pad > bytes.len() {
        return None;
    }
    let (body, padding) = bytes.split_at(bytes.len() - pad);
    padding
        .iter()
        .all(|&b| usize::from(b) == pad)
        .then_some(body)
}

/// Encrypts and decrypts envelopes under one key.
#[derive(Clone, Debug)]
pub struct EnvelopeCodec {
    key: EnvelopeKey,
}

impl EnvelopeCodec {
    /// Creates a codec for `key`.
    #[must_use]
    pub fn new(key: EnvelopeKey) -> Self {
        Self { key }
    }

    /// Creates a codec for the key every client ships with.
    #[must_use]
    pub fn embedded() -> Self {
        Self::new(EnvelopeKey::embedded())
    }

    /// Encrypts a UTF-8 string into an envelope.
    pub fn encrypt(&self, plaintext: &str) -> CryptoResult<Envelope> {
        encrypt(&self.key, plaintext.as_bytes())
    }

    /// Decrypts a hex ciphertext with a hex IV.
    pub fn decrypt(&self, ciphertext_hex: &str, iv_hex: &str) -> CryptoResult<String> {
        decrypt(&self.key, ciphertext_hex, iv_hex)
    }

    /// Decrypts an envelope.
    pub fn open(&self, envelope: &Envelope) -> CryptoResult<String> {
        self.decrypt(&envelope.data, &envelope.iv)
    }

    /// Decrypts an envelope whose plaintext is JSON.
    pub fn open_json(&self, envelope: &Envelope) -> CryptoResult<serde_json::Value> {
        let plain = self.open(envelope)?;
        Ok(serde_json::from_str(&plain)?)
    }

    /// Encrypts a JSON value into an envelope.
    pub fn seal_json(&self, value: &serde_json::Value) -> CryptoResult<Envelope> {
        let plain = serde_json::to_string(value)?;
        self.encrypt(&plain)
    }
}
