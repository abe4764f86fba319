//! The encrypted field envelope.
//!
//! An [`EncryptedField`] is the triple `(ciphertext, nonce, tag)` produced by
//! [`crate::crypto::encrypt`]. It carries no key material and is meaningless
//! without the key that sealed it.
//!
//! The persisted form is a JSON object with base64 members:
//!
//! ```json
//! { "ciphertext": "...", "nonce": "...", "tag": "..." }
//! ```
//!
//! Deserialization checks the nonce and tag lengths, so a malformed envelope
//! never reaches the cipher.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};

/// AES-256-GCM nonce length in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// AES-256-GCM authentication tag length in bytes (128 bits).
pub const TAG_LEN: usize = 16;

/// One authenticated-encrypted value.
///
/// Only [`crate::crypto::encrypt`] builds envelopes from plaintext; there is
/// no constructor that takes a caller-chosen nonce for sealing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawEnvelope", into = "RawEnvelope")]
pub struct EncryptedField {
    pub(crate) ciphertext: Vec<u8>,
    pub(crate) nonce: [u8; NONCE_LEN],
    pub(crate) auth_tag: [u8; TAG_LEN],
}

impl EncryptedField {
    /// Rebuild an envelope from its stored parts.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::DecryptionFailed`] if the nonce or tag has the
    /// wrong length.
    pub fn from_parts(ciphertext: Vec<u8>, nonce: &[u8], auth_tag: &[u8]) -> Result<Self> {
        let nonce: [u8; NONCE_LEN] = nonce.try_into().map_err(|_| {
            VaultError::decryption(format!(
                "malformed envelope: nonce must be {NONCE_LEN} bytes, got {}",
                nonce.len()
            ))
        })?;
        let auth_tag: [u8; TAG_LEN] = auth_tag.try_into().map_err(|_| {
            VaultError::decryption(format!(
                "malformed envelope: tag must be {TAG_LEN} bytes, got {}",
                auth_tag.len()
            ))
        })?;

        Ok(Self {
            ciphertext,
            nonce,
            auth_tag,
        })
    }

    /// Split the envelope into `(ciphertext, nonce, tag)`.
    pub fn into_parts(self) -> (Vec<u8>, [u8; NONCE_LEN], [u8; TAG_LEN]) {
        (self.ciphertext, self.nonce, self.auth_tag)
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn nonce(&self) -> &[u8; NONCE_LEN] {
        &self.nonce
    }

    pub fn auth_tag(&self) -> &[u8; TAG_LEN] {
        &self.auth_tag
    }

    /// Serialize to the JSON text stored in a database column.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| VaultError::Internal(format!("failed to serialize envelope: {e}")))
    }

    /// Parse the JSON text stored in a database column.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::DecryptionFailed`] for any malformed input.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| VaultError::decryption(format!("malformed envelope: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Wire representation
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct RawEnvelope {
    ciphertext: String,
    nonce: String,
    tag: String,
}

impl From<EncryptedField> for RawEnvelope {
    fn from(field: EncryptedField) -> Self {
        Self {
            ciphertext: BASE64.encode(&field.ciphertext),
            nonce: BASE64.encode(field.nonce),
            tag: BASE64.encode(field.auth_tag),
        }
    }
}

impl TryFrom<RawEnvelope> for EncryptedField {
    type Error = VaultError;

    fn try_from(raw: RawEnvelope) -> Result<Self> {
        let decode = |name: &str, value: &str| {
            BASE64
                .decode(value)
                .map_err(|e| VaultError::decryption(format!("malformed envelope {name}: {e}")))
        };

        let ciphertext = decode("ciphertext", &raw.ciphertext)?;
        let nonce = decode("nonce", &raw.nonce)?;
        let tag = decode("tag", &raw.tag)?;
        Self::from_parts(ciphertext, &nonce, &tag)
    }
}
