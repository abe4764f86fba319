//! Deterministic lookup identifiers for user emails.
//!
//! The `users` table is indexed by [`LookupId`], never by the email itself.
//! Normalization is a Unicode lowercase fold and nothing else, so lookups are
//! case-insensitive but sensitive to every other character (including
//! surrounding whitespace).

use serde::{Deserialize, Serialize};

use crate::kdf;

/// One-way identifier derived from a normalized email.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LookupId(String);

impl LookupId {
    /// Wrap an identifier loaded from storage.
    pub fn from_stored(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LookupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Case-fold an email for identity purposes.
pub fn normalize_email(email: &str) -> String {
    email.to_lowercase()
}

/// Derive the lookup identifier for `email`.
pub fn identify(email: &str) -> LookupId {
    LookupId(hex::encode(kdf::derive(&normalize_email(email))))
}
