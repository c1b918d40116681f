//! Envelope codec for the Veil client.
//!
//! The remote service wraps sensitive payloads in an *envelope*: a JSON
//! object `{"iv": "<hex>", "data": "<hex>"}` holding an AES-256-CBC
//! ciphertext and the IV it was produced with. Envelopes may appear at any
//! of a few fixed depths inside otherwise plain JSON responses.
//!
//! # Wire rules
//!
//! - **One pre-shared key**: every client embeds the same 256-bit key
//!   ([`EnvelopeKey::embedded`]). This is obfuscation rather than
//!   confidentiality and is treated as such.
//! - **Fresh IV per message**: [`EnvelopeCodec::encrypt`] draws 16 random
//!   bytes from the OS RNG for every call.
//! - **Hex at the boundary**: IV and ciphertext are hex strings. Inputs are
//!   charset-validated before any byte conversion is attempted.
//! - **Permissive unpadding**: PKCS7 padding is checked by hand. Valid
//!   padding is stripped; invalid padding is tolerated and the raw
//!   plaintext is returned, decoded lossily. Callers that need strictness
//!   must validate the decoded payload themselves.
//!
//! # Example
//!
//! ```
//! use veil_crypto::EnvelopeCodec;
//!
//! let codec = EnvelopeCodec::embedded();
//! let envelope = codec.encrypt("https://example.com/app.plist").unwrap();
//! let plain = codec.open(&envelope).unwrap();
//! assert_eq!(plain, "https://example.com/app.plist");
//! ```

mod cipher;
mod envelope;
mod error;
mod key;

pub use cipher::{EnvelopeCodec, decrypt, encrypt, is_hex, validate_format, BLOCK_SIZE, IV_SIZE};
pub use envelope::{Envelope, EnvelopeLocation, locate};
pub use error::{CryptoError, CryptoResult};
pub use key::{EnvelopeKey, EMBEDDED_KEY_HEX, KEY_SIZE};
