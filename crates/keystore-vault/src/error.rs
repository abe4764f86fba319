//! Vault error types.
//!
//! Every fallible operation in this crate returns [`VaultError`]. Variants
//! carry a short reason for diagnostics; reasons never contain plaintext,
//! key bytes, or salts.

/// Unified error type for the field encryption core.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// Sealing a field failed (CSPRNG failure, ring internal error).
    #[error("encryption failed: {reason}")]
    EncryptionFailed { reason: String },

    /// Opening a field failed: tag mismatch, wrong key, or a malformed
    /// envelope. No plaintext is ever returned alongside this error.
    #[error("decryption failed: {reason}")]
    DecryptionFailed { reason: String },

    /// Catch-all for unexpected internal errors that don't fit a specific
    /// variant.
    #[error("internal vault error: {0}")]
    Internal(String),
}

impl VaultError {
    pub(crate) fn decryption(reason: impl Into<String>) -> Self {
        Self::DecryptionFailed {
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the vault crate.
pub type Result<T> = std::result::Result<T, VaultError>;
