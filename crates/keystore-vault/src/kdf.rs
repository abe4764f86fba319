//! Deterministic key derivation.
//!
//! A single SHA-256 mapping serves two callers: turning a user's random
//! encryption salt into that user's field key, and turning a normalized email
//! into a lookup identifier (see [`crate::identity`]). Callers supply
//! already-distinct inputs, so no per-purpose domain separation is applied.

use ring::digest;
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

use crate::error::{Result, VaultError};

/// Length of a derived key in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// Length of a freshly generated encryption salt, before hex encoding.
pub const SALT_LEN: usize = 32;

/// Derive a fixed-length key from `secret`.
///
/// Total over every string input; the same input always yields the same
/// output.
pub fn derive(secret: &str) -> [u8; KEY_LEN] {
    let hash = digest::digest(&digest::SHA256, secret.as_bytes());
    let mut out = [0u8; KEY_LEN];
    out.copy_from_slice(hash.as_ref());
    out
}

// ---------------------------------------------------------------------------
// Encryption salt
// ---------------------------------------------------------------------------

/// A per-user random salt, generated once at registration and never changed.
///
/// Stored as lowercase hex. Regenerating it would orphan every field sealed
/// under the old key, so there is no API to replace the salt of an existing
/// account.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionSalt(String);

impl EncryptionSalt {
    /// Generate a new salt from the system CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Internal`] if the CSPRNG fails.
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; SALT_LEN];
        SystemRandom::new()
            .fill(&mut bytes)
            .map_err(|_| VaultError::Internal("failed to generate encryption salt".into()))?;
        Ok(Self(hex::encode(bytes)))
    }

    /// Wrap a salt loaded from storage.
    pub fn from_stored(value: String) -> Self {
        Self(value)
    }

    /// The stored representation. Only the persistence layer should need this.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for EncryptionSalt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionSalt(..)")
    }
}

// ---------------------------------------------------------------------------
// Field key
// ---------------------------------------------------------------------------

/// The per-user symmetric key used for all of that user's encrypted fields.
///
/// The key bytes are zeroized on drop and never printed.
pub struct FieldKey(Zeroizing<[u8; KEY_LEN]>);

impl FieldKey {
    /// Derive the field key belonging to `salt`.
    pub fn derive(salt: &EncryptionSalt) -> Self {
        Self(Zeroizing::new(derive(salt.expose())))
    }

    /// Build a key from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }
}

impl std::fmt::Debug for FieldKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FieldKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_deterministic() {
        assert_eq!(derive("same input"), derive("same input"));
        assert_ne!(derive("input a"), derive("input b"));
    }

    #[test]
    fn derive_matches_sha256_vector() {
        // SHA-256("abc")
        assert_eq!(
            hex::encode(derive("abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn derive_accepts_empty_input() {
        assert_eq!(derive("").len(), KEY_LEN);
    }

    #[test]
    fn generated_salts_are_hex_and_distinct() {
        let a = EncryptionSalt::generate().unwrap();
        let b = EncryptionSalt::generate().unwrap();

        assert_eq!(a.expose().len(), SALT_LEN * 2);
        assert!(a.expose().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(a, b);
    }

    #[test]
    fn field_key_follows_salt() {
        let salt = EncryptionSalt::from_stored("00ff".into());
        let k1 = FieldKey::derive(&salt);
        let k2 = FieldKey::derive(&salt);
        assert_eq!(k1.as_bytes(), k2.as_bytes());
        assert_eq!(k1.as_bytes(), derive("00ff").as_slice());
    }

    #[test]
    fn debug_output_is_redacted() {
        let salt = EncryptionSalt::from_stored("deadbeef".into());
        let key = FieldKey::derive(&salt);

        assert!(!format!("{salt:?}").contains("deadbeef"));
        assert_eq!(format!("{key:?}"), "FieldKey(..)");
    }
}
