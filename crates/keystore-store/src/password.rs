//! Password verifiers for login.
//!
//! Passwords are hashed with PBKDF2-HMAC-SHA256 (ring) and stored as
//! `base64(salt):base64(hash)` strings, using 600,000 iterations per OWASP
//! 2023 recommendations. This salt is unrelated to the account's encryption
//! salt.

use std::num::NonZeroU32;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{StoreError, StoreResult};

const PBKDF2_ITERATIONS: NonZeroU32 = match NonZeroU32::new(600_000) {
    Some(n) => n,
    None => unreachable!(),
};

const SALT_LEN: usize = 32;
const HASH_LEN: usize = 32;

static PBKDF2_ALG: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

/// Hash `password` into a storable verifier string.
pub fn hash_password(password: &str) -> StoreResult<String> {
    let mut salt = [0u8; SALT_LEN];
    SystemRandom::new()
        .fill(&mut salt)
        .map_err(|_| StoreError::InvalidArgument("failed to generate random salt".into()))?;

    let mut hash = [0u8; HASH_LEN];
    pbkdf2::derive(PBKDF2_ALG, PBKDF2_ITERATIONS, &salt, password.as_bytes(), &mut hash);

    Ok(format!("{}:{}", BASE64.encode(salt), BASE64.encode(hash)))
}

/// Check `password` against a verifier produced by [`hash_password`].
///
/// A malformed verifier never matches. Comparison is constant-time (ring).
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, hash)) = stored.split_once(':') else {
        return false;
    };
    let (Ok(salt), Ok(hash)) = (BASE64.decode(salt), BASE64.decode(hash)) else {
        return false;
    };

    pbkdf2::verify(PBKDF2_ALG, PBKDF2_ITERATIONS, &salt, password.as_bytes(), &hash).is_ok()
}
