//! User account persistence.
//!
//! Users are found by [`LookupId`] (derived from the normalized email) or by
//! id. The stored name and email are [`EncryptedField`]s sealed under the
//! user's own field key; the encryption salt is written once at creation and
//! the schema refuses to change it afterwards.

use chrono::{DateTime, Utc};
use keystore_vault::{
    CredentialClock, EncryptedField, EncryptionSalt, FieldKey, LookupId, crypto, identity,
};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::db::{Database, datetime_from_millis};
use crate::error::{StoreError, StoreResult};
use crate::password;

// ═══════════════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════════════

/// A user account as stored.
#[derive(Clone)]
pub struct User {
    /// Unique identifier (UUID v7).
    pub id: String,
    /// Lookup identifier derived from the normalized email. Immutable.
    pub lookup_id: LookupId,
    pub name: EncryptedField,
    /// The normalized email, sealed.
    pub email: EncryptedField,
    pub avatar: Option<String>,
    pub verified: bool,
    password_hash: String,
    encryption_salt: EncryptionSalt,
    credential_changed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Decrypted profile fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub email: String,
}

impl User {
    /// Build a new account: index the email, generate the salt, seal the
    /// profile fields and hash the password.
    ///
    /// The result is not persisted; pass it to [`UserStore::create`].
    pub fn register(name: &str, email: &str, password: &str, now: DateTime<Utc>) -> StoreResult<Self> {
        let encryption_salt = EncryptionSalt::generate()?;
        let key = FieldKey::derive(&encryption_salt);

        Ok(Self {
            id: Uuid::now_v7().to_string(),
            lookup_id: identity::identify(email),
            name: crypto::encrypt(name, &key)?,
            email: crypto::encrypt(&identity::normalize_email(email), &key)?,
            avatar: None,
            verified: false,
            password_hash: password::hash_password(password)?,
            encryption_salt,
            credential_changed_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// The key sealing every field this user owns.
    pub fn field_key(&self) -> FieldKey {
        FieldKey::derive(&self.encryption_salt)
    }

    /// Decrypt the name and email.
    pub fn profile(&self) -> StoreResult<Profile> {
        let key = self.field_key();
        Ok(Profile {
            name: crypto::decrypt(&self.name, &key)?,
            email: crypto::decrypt(&self.email, &key)?,
        })
    }

    /// Replace the display name.
    pub fn set_name(&mut self, name: &str, now: DateTime<Utc>) -> StoreResult<()> {
        self.name = crypto::encrypt(name, &self.field_key())?;
        self.touch(now);
        Ok(())
    }

    pub fn set_avatar(&mut self, avatar: Option<String>, now: DateTime<Utc>) {
        self.avatar = avatar;
        self.touch(now);
    }

    /// Rotate the login password.
    ///
    /// Records the rotation in `credential_changed_at`, which never moves
    /// backwards, so every token issued before `now` stops being honored.
    pub fn rotate_password(&mut self, new_password: &str, now: DateTime<Utc>) -> StoreResult<()> {
        self.password_hash = password::hash_password(new_password)?;
        let changed_at = match self.credential_changed_at {
            Some(previous) => previous.max(now),
            None => now,
        };
        self.credential_changed_at = Some(changed_at);
        self.touch(now);
        Ok(())
    }

    pub fn verify_password(&self, candidate: &str) -> bool {
        password::verify_password(candidate, &self.password_hash)
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = self.updated_at.max(now);
    }
}

impl CredentialClock for User {
    fn credential_changed_at(&self) -> Option<DateTime<Utc>> {
        self.credential_changed_at
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("lookup_id", &self.lookup_id)
            .field("verified", &self.verified)
            .field("credential_changed_at", &self.credential_changed_at)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish_non_exhaustive()
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  UserStore
// ═══════════════════════════════════════════════════════════════════════

const USER_COLUMNS: &str = "id, lookup_id, name, email, avatar, verified, password_hash, \
                            encryption_salt, credential_changed_at, created_at, updated_at";

/// CRUD operations on user accounts.
#[derive(Clone)]
pub struct UserStore {
    db: Database,
}

impl UserStore {
    /// Create a new user store backed by `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persist a freshly registered user.
    ///
    /// Returns [`StoreError::DuplicateIdentity`] if the lookup id is taken.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn create(&self, user: &User) -> StoreResult<()> {
        let row = UserRow::from_user(user)?;

        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO users (id, lookup_id, name, email, avatar, verified, password_hash, \
                     encryption_salt, credential_changed_at, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    rusqlite::params![
                        row.id,
                        row.lookup_id,
                        row.name,
                        row.email,
                        row.avatar,
                        row.verified,
                        row.password_hash,
                        row.encryption_salt,
                        row.credential_changed_at,
                        row.created_at,
                        row.updated_at,
                    ],
                )
                .map_err(|e| {
                    if let rusqlite::Error::SqliteFailure(ref err, _) = e
                        && err.code == rusqlite::ErrorCode::ConstraintViolation
                    {
                        return StoreError::DuplicateIdentity;
                    }
                    StoreError::Sqlite(e)
                })?;
                Ok(())
            })
            .await?;

        debug!("user created");
        Ok(())
    }

    /// Find a user by lookup identifier.
    #[instrument(skip(self))]
    pub async fn find_by_lookup_id(&self, lookup_id: &LookupId) -> StoreResult<Option<User>> {
        let lookup_id = lookup_id.as_str().to_owned();
        self.find_one("lookup_id", lookup_id).await
    }

    /// Find a user by id.
    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        self.find_one("id", id.to_owned()).await
    }

    /// Write back the mutable parts of `user`.
    ///
    /// The lookup id and the encryption salt are never written here.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn save(&self, user: &User) -> StoreResult<()> {
        let row = UserRow::from_user(user)?;

        self.db
            .execute(move |conn| {
                let updated = conn.execute(
                    "UPDATE users SET name = ?2, email = ?3, avatar = ?4, verified = ?5, \
                     password_hash = ?6, credential_changed_at = ?7, updated_at = ?8 \
                     WHERE id = ?1",
                    rusqlite::params![
                        row.id,
                        row.name,
                        row.email,
                        row.avatar,
                        row.verified,
                        row.password_hash,
                        row.credential_changed_at,
                        row.updated_at,
                    ],
                )?;
                if updated == 0 {
                    return Err(StoreError::NotFound {
                        entity: "user",
                        id: row.id,
                    });
                }
                Ok(())
            })
            .await?;

        debug!("user saved");
        Ok(())
    }

    /// Delete a user and, by cascade, every vault record they own.
    ///
    /// Returns `false` if no such user existed.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> StoreResult<bool> {
        let id = id.to_owned();
        let deleted = self
            .db
            .execute(move |conn| Ok(conn.execute("DELETE FROM users WHERE id = ?1", [id])?))
            .await?;
        Ok(deleted > 0)
    }

    async fn find_one(&self, column: &'static str, value: String) -> StoreResult<Option<User>> {
        self.db
            .execute(move |conn| {
                let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
                let result = conn.query_row(&sql, [value], UserRow::from_row);
                match result {
                    Ok(row) => row.into_user().map(Some),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(StoreError::Sqlite(e)),
                }
            })
            .await
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Internal row mapping
// ═══════════════════════════════════════════════════════════════════════

/// Raw column values, envelopes as JSON text and instants as milliseconds.
struct UserRow {
    id: String,
    lookup_id: String,
    name: String,
    email: String,
    avatar: Option<String>,
    verified: bool,
    password_hash: String,
    encryption_salt: String,
    credential_changed_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl UserRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            lookup_id: row.get(1)?,
            name: row.get(2)?,
            email: row.get(3)?,
            avatar: row.get(4)?,
            verified: row.get(5)?,
            password_hash: row.get(6)?,
            encryption_salt: row.get(7)?,
            credential_changed_at: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    fn from_user(user: &User) -> StoreResult<Self> {
        Ok(Self {
            id: user.id.clone(),
            lookup_id: user.lookup_id.as_str().to_owned(),
            name: user.name.to_json()?,
            email: user.email.to_json()?,
            avatar: user.avatar.clone(),
            verified: user.verified,
            password_hash: user.password_hash.clone(),
            encryption_salt: user.encryption_salt.expose().to_owned(),
            credential_changed_at: user.credential_changed_at.map(|t| t.timestamp_millis()),
            created_at: user.created_at.timestamp_millis(),
            updated_at: user.updated_at.timestamp_millis(),
        })
    }

    fn into_user(self) -> StoreResult<User> {
        Ok(User {
            id: self.id,
            lookup_id: LookupId::from_stored(self.lookup_id),
            name: EncryptedField::from_json(&self.name)?,
            email: EncryptedField::from_json(&self.email)?,
            avatar: self.avatar,
            verified: self.verified,
            password_hash: self.password_hash,
            encryption_salt: EncryptionSalt::from_stored(self.encryption_salt),
            credential_changed_at: self
                .credential_changed_at
                .map(datetime_from_millis)
                .transpose()?,
            created_at: datetime_from_millis(self.created_at)?,
            updated_at: datetime_from_millis(self.updated_at)?,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════
