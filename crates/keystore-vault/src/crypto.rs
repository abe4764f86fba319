//! AES-256-GCM field encryption and decryption using the `ring` crate.
//!
//! - **Encryption**: every call draws a fresh 96-bit nonce from the system
//!   CSPRNG and binds it to a sealing key that can be used exactly once.
//! - **Decryption**: the tag is verified before any plaintext is released.
//!   A wrong key, any flipped bit in the ciphertext, nonce or tag, or a
//!   plaintext that is not UTF-8 all fail closed with
//!   [`VaultError::DecryptionFailed`].
//!
//! Neither function logs key material or plaintext; only lengths are traced.

use ring::aead::{self, Aad, BoundKey, Nonce, NonceSequence, OpeningKey, SealingKey, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};

use crate::envelope::{EncryptedField, NONCE_LEN, TAG_LEN};
use crate::error::{Result, VaultError};
use crate::kdf::FieldKey;

/// AES-256-GCM algorithm from `ring`.
static AEAD_ALG: &aead::Algorithm = &aead::AES_256_GCM;

// ---------------------------------------------------------------------------
// Nonce handling
// ---------------------------------------------------------------------------

/// A nonce sequence that yields exactly one nonce and then errors.
///
/// Each bound key built in this module lives for a single seal or open, so a
/// second `advance` would indicate a (key, nonce) reuse and is refused.
struct SingleNonce(Option<[u8; NONCE_LEN]>);

impl SingleNonce {
    fn new(bytes: [u8; NONCE_LEN]) -> Self {
        Self(Some(bytes))
    }
}

impl NonceSequence for SingleNonce {
    fn advance(&mut self) -> std::result::Result<Nonce, ring::error::Unspecified> {
        self.0
            .take()
            .map(Nonce::assume_unique_for_key)
            .ok_or(ring::error::Unspecified)
    }
}

// ---------------------------------------------------------------------------
// Encryption
// ---------------------------------------------------------------------------

/// Encrypt `plaintext` under `key`.
///
/// The empty string is valid input; it still gets a fresh nonce and a tag.
///
/// # Errors
///
/// Returns [`VaultError::EncryptionFailed`] if the CSPRNG or `ring` fails.
pub fn encrypt(plaintext: &str, key: &FieldKey) -> Result<EncryptedField> {
    let mut nonce = [0u8; NONCE_LEN];
    SystemRandom::new()
        .fill(&mut nonce)
        .map_err(|_| VaultError::EncryptionFailed {
            reason: "failed to generate random nonce".into(),
        })?;

    let unbound = UnboundKey::new(AEAD_ALG, key.as_bytes()).map_err(|_| {
        VaultError::EncryptionFailed {
            reason: "failed to create AES-256-GCM key".into(),
        }
    })?;
    let mut sealing_key = SealingKey::new(unbound, SingleNonce::new(nonce));

    let mut ciphertext = plaintext.as_bytes().to_vec();
    let tag = sealing_key
        .seal_in_place_separate_tag(Aad::empty(), &mut ciphertext)
        .map_err(|_| VaultError::EncryptionFailed {
            reason: "seal_in_place failed".into(),
        })?;

    let mut auth_tag = [0u8; TAG_LEN];
    auth_tag.copy_from_slice(tag.as_ref());

    tracing::trace!(
        plaintext_len = plaintext.len(),
        ciphertext_len = ciphertext.len(),
        "sealed field"
    );

    Ok(EncryptedField {
        ciphertext,
        nonce,
        auth_tag,
    })
}

// ---------------------------------------------------------------------------
// Decryption
// ---------------------------------------------------------------------------

/// Decrypt `field` under `key`.
///
/// # Errors
///
/// Returns [`VaultError::DecryptionFailed`] if authentication fails for any
/// reason or the recovered bytes are not UTF-8.
pub fn decrypt(field: &EncryptedField, key: &FieldKey) -> Result<String> {
    let unbound = UnboundKey::new(AEAD_ALG, key.as_bytes())
        .map_err(|_| VaultError::decryption("failed to create AES-256-GCM key"))?;
    let mut opening_key = OpeningKey::new(unbound, SingleNonce::new(field.nonce));

    let mut in_out = Vec::with_capacity(field.ciphertext.len() + TAG_LEN);
    in_out.extend_from_slice(&field.ciphertext);
    in_out.extend_from_slice(&field.auth_tag);

    let plaintext = opening_key
        .open_in_place(Aad::empty(), &mut in_out)
        .map_err(|_| VaultError::decryption("authentication failed: wrong key or corrupted data"))?;

    let text = std::str::from_utf8(plaintext)
        .map_err(|_| VaultError::decryption("plaintext is not valid UTF-8"))?
        .to_owned();

    tracing::trace!(
        ciphertext_len = field.ciphertext.len(),
        plaintext_len = text.len(),
        "opened field"
    );

    Ok(text)
}

// ---------------------------------------------------------------------------
// Random bytes
// ---------------------------------------------------------------------------

/// Generate `len` cryptographically secure random bytes.
///
/// # Errors
///
/// Returns [`VaultError::Internal`] if the system CSPRNG fails.
pub fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    SystemRandom::new()
        .fill(&mut buf)
        .map_err(|_| VaultError::Internal("failed to generate random bytes".into()))?;
    Ok(buf)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
