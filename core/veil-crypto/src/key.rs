//! The pre-shared envelope key.

use crate::error::{CryptoError, CryptoResult};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;

/// Hex form of the key every client ships with.
pub const EMBEDDED_KEY_HEX: &str =
    "5486abfd96080e09e82bb2ab93258bde19d069185366b5aa8d38467835f2e7aa";

const EMBEDDED_KEY: [u8; KEY_SIZE] = [
    0x54, 0x86, 0xab, 0xfd, 0x96, 0x08, 0x0e, 0x09, 0xe8, 0x2b, 0xb2, 0xab, 0x93, 0x25, 0x8b, 0xde,
    0x19, 0xd0, 0x69, 0x18, 0x53, 0x66, 0xb5, 0xaa, 0x8d, 0x38, 0x46, 0x78, 0x35, 0xf2, 0xe7, 0xaa,
];

/// A 256-bit symmetric key, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EnvelopeKey {
    bytes: [u8; KEY_SIZE],
}

impl EnvelopeKey {
    /// Creates a key from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Parses a key from its 64-digit hex form.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidFormat`] for non-hex input and
    /// [`CryptoError::InvalidKeyLength`] when the decoded key is not 32 bytes.
    pub fn from_hex(hex_key: &str) -> CryptoResult<Self> {
        let decoded = hex::decode(hex_key.trim())
            .map_err(|e| CryptoError::InvalidFormat(format!("key is not hex: {e}")))?;
        let bytes: [u8; KEY_SIZE] =
            decoded
                .as_slice()
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: KEY_SIZE,
                    actual: decoded.len(),
                })?;
        Ok(Self { bytes })
    }

    /// Returns the key compiled into every client.
    #[must_use]
    pub fn embedded() -> Self {
        Self {
            bytes: EMBEDDED_KEY,
        }
    }

    /// Returns the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for EnvelopeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}
