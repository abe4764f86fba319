//! The vault record model.
//!
//! A [`VaultRecord`] is one stored credential entry. Every sensitive field is
//! an [`EncryptedField`] sealed under the owner's [`FieldKey`]; only `id`,
//! `owner_id`, and the timestamps are stored in the clear.
//!
//! Lifecycle: `absent -> created -> {updated}* -> deleted`. Any subset of the
//! five fields may be rewritten in an update. Rewriting `password` advances
//! `last_changed_at`; rewriting any other field does not.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto;
use crate::envelope::EncryptedField;
use crate::error::Result;
use crate::kdf::FieldKey;

// ---------------------------------------------------------------------------
// Entry fields
// ---------------------------------------------------------------------------

/// The five secret-bearing fields of an entry, in either plaintext or sealed
/// form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFields<T> {
    pub app: T,
    pub email: T,
    pub username: T,
    pub password: T,
    /// One-time-code seed. May be the empty string, never absent.
    pub authenticator: T,
}

/// Decrypted entry contents.
pub type PlainEntry = EntryFields<String>;

/// Entry contents as stored.
pub type SealedEntry = EntryFields<EncryptedField>;

impl<T> EntryFields<T> {
    fn try_map<U>(&self, mut f: impl FnMut(&T) -> Result<U>) -> Result<EntryFields<U>> {
        Ok(EntryFields {
            app: f(&self.app)?,
            email: f(&self.email)?,
            username: f(&self.username)?,
            password: f(&self.password)?,
            authenticator: f(&self.authenticator)?,
        })
    }
}

impl PlainEntry {
    /// Seal every field under `key`, each with its own nonce.
    pub fn seal(&self, key: &FieldKey) -> Result<SealedEntry> {
        self.try_map(|value| crypto::encrypt(value, key))
    }
}

impl SealedEntry {
    /// Open every field under `key`. Fails as a whole if any field fails.
    pub fn open(&self, key: &FieldKey) -> Result<PlainEntry> {
        self.try_map(|field| crypto::decrypt(field, key))
    }
}

/// A partial update: `Some` fields are rewritten, `None` fields are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryPatch {
    pub app: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub authenticator: Option<String>,
}

impl EntryPatch {
    pub fn is_empty(&self) -> bool {
        self.app.is_none()
            && self.email.is_none()
            && self.username.is_none()
            && self.password.is_none()
            && self.authenticator.is_none()
    }
}

// ---------------------------------------------------------------------------
// VaultRecord
// ---------------------------------------------------------------------------

/// A stored credential entry belonging to exactly one owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultRecord {
    /// Unique identifier (UUID v7).
    pub id: String,
    /// The owning user's id. Never changes after creation.
    pub owner_id: String,
    pub fields: SealedEntry,
    /// Last time the password field was rewritten.
    pub last_changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VaultRecord {
    /// Create a new record for `owner_id`, sealing all five fields.
    pub fn create(
        owner_id: impl Into<String>,
        entry: &PlainEntry,
        key: &FieldKey,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let fields = entry.seal(key)?;
        Ok(Self {
            id: Uuid::now_v7().to_string(),
            owner_id: owner_id.into(),
            fields,
            last_changed_at: now,
            created_at: now,
            updated_at: now,
        })
    }

    /// Decrypt the record's fields.
    pub fn open(&self, key: &FieldKey) -> Result<PlainEntry> {
        self.fields.open(key)
    }

    /// Apply `patch`, re-sealing each provided field with a fresh nonce.
    ///
    /// Returns `true` if the password was rewritten (and `last_changed_at`
    /// advanced). The record is left untouched if sealing any field fails.
    pub fn apply(&mut self, patch: &EntryPatch, key: &FieldKey, now: DateTime<Utc>) -> Result<bool> {
        if patch.is_empty() {
            return Ok(false);
        }

        let seal = |value: &Option<String>| -> Result<Option<EncryptedField>> {
            value.as_deref().map(|v| crypto::encrypt(v, key)).transpose()
        };

        let app = seal(&patch.app)?;
        let email = seal(&patch.email)?;
        let username = seal(&patch.username)?;
        let password = seal(&patch.password)?;
        let authenticator = seal(&patch.authenticator)?;

        if let Some(field) = app {
            self.fields.app = field;
        }
        if let Some(field) = email {
            self.fields.email = field;
        }
        if let Some(field) = username {
            self.fields.username = field;
        }
        if let Some(field) = authenticator {
            self.fields.authenticator = field;
        }

        let password_rotated = password.is_some();
        if let Some(field) = password {
            self.fields.password = field;
            self.last_changed_at = now.max(self.last_changed_at);
        }

        self.updated_at = now.max(self.updated_at);
        Ok(password_rotated)
    }
}
