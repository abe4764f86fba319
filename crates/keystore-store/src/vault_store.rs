//! Owner-scoped persistence for vault records.
//!
//! Records are only reachable through an [`OwnerVault`] handle bound to one
//! owner id. Every statement it issues carries `owner_id = ?`, so a record
//! belonging to someone else is invisible to reads and untouched by writes;
//! callers see "not found" rather than another tenant's data.

use keystore_vault::{EncryptedField, EntryFields, VaultRecord};
use tracing::{debug, instrument};

use crate::db::{Database, datetime_from_millis};
use crate::error::{StoreError, StoreResult};

/// Entry point for vault record storage.
#[derive(Clone)]
pub struct VaultRecordStore {
    db: Database,
}

impl VaultRecordStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// A handle that can only see and modify records owned by `owner_id`.
    pub fn for_owner(&self, owner_id: impl Into<String>) -> OwnerVault {
        OwnerVault {
            db: self.db.clone(),
            owner_id: owner_id.into(),
        }
    }
}

/// Vault records of a single owner.
#[derive(Clone)]
pub struct OwnerVault {
    db: Database,
    owner_id: String,
}

const RECORD_COLUMNS: &str = "id, owner_id, app, email, username, password, authenticator, \
                              last_changed_at, created_at, updated_at";

impl OwnerVault {
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// All records of this owner, oldest first.
    #[instrument(skip(self), fields(owner_id = %self.owner_id))]
    pub async fn list(&self) -> StoreResult<Vec<VaultRecord>> {
        let owner_id = self.owner_id.clone();
        self.db
            .execute(move |conn| {
                let sql = format!(
                    "SELECT {RECORD_COLUMNS} FROM vault_records \
                     WHERE owner_id = ?1 ORDER BY created_at ASC, id ASC"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map([owner_id], RecordRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows.into_iter().map(RecordRow::into_record).collect()
            })
            .await
    }

    /// One record by id, or `None` if it does not exist for this owner.
    #[instrument(skip(self), fields(owner_id = %self.owner_id))]
    pub async fn find(&self, id: &str) -> StoreResult<Option<VaultRecord>> {
        let owner_id = self.owner_id.clone();
        let id = id.to_owned();
        self.db
            .execute(move |conn| {
                let sql = format!(
                    "SELECT {RECORD_COLUMNS} FROM vault_records WHERE id = ?1 AND owner_id = ?2"
                );
                match conn.query_row(&sql, [id, owner_id], RecordRow::from_row) {
                    Ok(row) => row.into_record().map(Some),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(StoreError::Sqlite(e)),
                }
            })
            .await
    }

    /// Persist a new record.
    #[instrument(skip(self, record), fields(owner_id = %self.owner_id, record_id = %record.id))]
    pub async fn insert(&self, record: &VaultRecord) -> StoreResult<()> {
        let row = self.row_for(record)?;
        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO vault_records (id, owner_id, app, email, username, password, \
                     authenticator, last_changed_at, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    rusqlite::params![
                        row.id,
                        row.owner_id,
                        row.app,
                        row.email,
                        row.username,
                        row.password,
                        row.authenticator,
                        row.last_changed_at,
                        row.created_at,
                        row.updated_at,
                    ],
                )?;
                Ok(())
            })
            .await?;

        debug!("vault record created");
        Ok(())
    }

    /// Overwrite a record's fields and timestamps.
    ///
    /// Returns `false` if no record with this id exists for this owner.
    #[instrument(skip(self, record), fields(owner_id = %self.owner_id, record_id = %record.id))]
    pub async fn update(&self, record: &VaultRecord) -> StoreResult<bool> {
        let row = self.row_for(record)?;
        let updated = self
            .db
            .execute(move |conn| {
                Ok(conn.execute(
                    "UPDATE vault_records SET app = ?3, email = ?4, username = ?5, password = ?6, \
                     authenticator = ?7, last_changed_at = ?8, updated_at = ?9 \
                     WHERE id = ?1 AND owner_id = ?2",
                    rusqlite::params![
                        row.id,
                        row.owner_id,
                        row.app,
                        row.email,
                        row.username,
                        row.password,
                        row.authenticator,
                        row.last_changed_at,
                        row.updated_at,
                    ],
                )?)
            })
            .await?;

        debug!(updated, "vault record update");
        Ok(updated > 0)
    }

    /// Delete a record. Returns `false` if it did not exist for this owner.
    #[instrument(skip(self), fields(owner_id = %self.owner_id))]
    pub async fn delete(&self, id: &str) -> StoreResult<bool> {
        let owner_id = self.owner_id.clone();
        let id = id.to_owned();
        let deleted = self
            .db
            .execute(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM vault_records WHERE id = ?1 AND owner_id = ?2",
                    [id, owner_id],
                )?)
            })
            .await?;

        debug!(deleted, "vault record delete");
        Ok(deleted > 0)
    }

    /// Refuse to write a record that belongs to someone else.
    fn row_for(&self, record: &VaultRecord) -> StoreResult<RecordRow> {
        if record.owner_id != self.owner_id {
            return Err(StoreError::InvalidArgument(
                "record owner does not match the requesting owner".into(),
            ));
        }
        RecordRow::from_record(record)
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Internal row mapping
// ═══════════════════════════════════════════════════════════════════════

struct RecordRow {
    id: String,
    owner_id: String,
    app: String,
    email: String,
    username: String,
    password: String,
    authenticator: String,
    last_changed_at: i64,
    created_at: i64,
    updated_at: i64,
}

impl RecordRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            app: row.get(2)?,
            email: row.get(3)?,
            username: row.get(4)?,
            password: row.get(5)?,
            authenticator: row.get(6)?,
            last_changed_at: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn from_record(record: &VaultRecord) -> StoreResult<Self> {
        let f = &record.fields;
        Ok(Self {
            id: record.id.clone(),
            owner_id: record.owner_id.clone(),
            app: f.app.to_json()?,
            email: f.email.to_json()?,
            username: f.username.to_json()?,
            password: f.password.to_json()?,
            authenticator: f.authenticator.to_json()?,
            last_changed_at: record.last_changed_at.timestamp_millis(),
            created_at: record.created_at.timestamp_millis(),
            updated_at: record.updated_at.timestamp_millis(),
        })
    }

    fn into_record(self) -> StoreResult<VaultRecord> {
        Ok(VaultRecord {
            id: self.id,
            owner_id: self.owner_id,
            fields: EntryFields {
                app: EncryptedField::from_json(&self.app)?,
                email: EncryptedField::from_json(&self.email)?,
                username: EncryptedField::from_json(&self.username)?,
                password: EncryptedField::from_json(&self.password)?,
                authenticator: EncryptedField::from_json(&self.authenticator)?,
            },
            last_changed_at: datetime_from_millis(self.last_changed_at)?,
            created_at: datetime_from_millis(self.created_at)?,
            updated_at: datetime_from_millis(self.updated_at)?,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user_store::{User, UserStore};
    use chrono::{Duration, Utc};
    use keystore_vault::{EntryPatch, PlainEntry};

    struct Fixture {
        users: UserStore,
        records: VaultRecordStore,
    }

    async fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        Fixture {
            users: UserStore::new(db.clone()),
            records: VaultRecordStore::new(db),
        }
    }

    async fn registered(fx: &Fixture, email: &str) -> User {
        let user = User::register("Test", email, "password-1", Utc::now()).unwrap();
        fx.users.create(&user).await.unwrap();
        user
    }

    fn entry(app: &str) -> PlainEntry {
        EntryFields {
            app: app.into(),
            email: "login@example.com".into(),
            username: "login".into(),
            password: "pw".into(),
            authenticator: String::new(),
        }
    }

    #[tokio::test]
    async fn insert_list_find_round_trip() {
        let fx = fixture().await;
        let user = registered(&fx, "a@example.com").await;
        let key = user.field_key();
        let vault = fx.records.for_owner(&user.id);

        let record = VaultRecord::create(&user.id, &entry("GitHub"), &key, Utc::now()).unwrap();
        vault.insert(&record).await.unwrap();

        let listed = vault.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].open(&key).unwrap(), entry("GitHub"));

        let found = vault.find(&record.id).await.unwrap().unwrap();
        assert_eq!(found.id, record.id);
        assert_eq!(
            found.last_changed_at.timestamp_millis(),
            record.last_changed_at.timestamp_millis()
        );
    }

    #[tokio::test]
    async fn other_owner_cannot_see_update_or_delete() {
        let fx = fixture().await;
        let alice = registered(&fx, "alice@example.com").await;
        let bob = registered(&fx, "bob@example.com").await;

        let alice_vault = fx.records.for_owner(&alice.id);
        let bob_vault = fx.records.for_owner(&bob.id);

        let mut record =
            VaultRecord::create(&alice.id, &entry("Bank"), &alice.field_key(), Utc::now()).unwrap();
        alice_vault.insert(&record).await.unwrap();

        assert!(bob_vault.list().await.unwrap().is_empty());
        assert!(bob_vault.find(&record.id).await.unwrap().is_none());
        assert!(!bob_vault.delete(&record.id).await.unwrap());

        // Bob's handle refuses to write Alice's record outright.
        record
            .apply(
                &EntryPatch {
                    password: Some("stolen".into()),
                    ..Default::default()
                },
                &alice.field_key(),
                Utc::now(),
            )
            .unwrap();
        assert!(matches!(
            bob_vault.update(&record).await,
            Err(StoreError::InvalidArgument(_))
        ));

        // And a record relabelled as Bob's does not match Alice's row.
        let mut relabelled = record.clone();
        relabelled.owner_id = bob.id.clone();
        assert!(!bob_vault.update(&relabelled).await.unwrap());

        let still = alice_vault.find(&record.id).await.unwrap().unwrap();
        assert_eq!(still.open(&alice.field_key()).unwrap().password, "pw");
    }

    #[tokio::test]
    async fn update_persists_password_rotation_only_timestamp() {
        let fx = fixture().await;
        let user = registered(&fx, "c@example.com").await;
        let key = user.field_key();
        let vault = fx.records.for_owner(&user.id);

        let t0 = Utc::now();
        let mut record = VaultRecord::create(&user.id, &entry("Mail"), &key, t0).unwrap();
        vault.insert(&record).await.unwrap();

        let t1 = t0 + Duration::seconds(30);
        record
            .apply(
                &EntryPatch {
                    app: Some("Webmail".into()),
                    ..Default::default()
                },
                &key,
                t1,
            )
            .unwrap();
        assert!(vault.update(&record).await.unwrap());

        let loaded = vault.find(&record.id).await.unwrap().unwrap();
        assert_eq!(loaded.last_changed_at.timestamp_millis(), t0.timestamp_millis());
        assert_eq!(loaded.updated_at.timestamp_millis(), t1.timestamp_millis());

        let t2 = t1 + Duration::seconds(30);
        record
            .apply(
                &EntryPatch {
                    password: Some("rotated".into()),
                    ..Default::default()
                },
                &key,
                t2,
            )
            .unwrap();
        vault.update(&record).await.unwrap();

        let loaded = vault.find(&record.id).await.unwrap().unwrap();
        assert_eq!(loaded.last_changed_at.timestamp_millis(), t2.timestamp_millis());
        assert_eq!(loaded.open(&key).unwrap().password, "rotated");
    }

    #[tokio::test]
    async fn delete_is_terminal() {
        let fx = fixture().await;
        let user = registered(&fx, "d@example.com").await;
        let vault = fx.records.for_owner(&user.id);

        let record =
            VaultRecord::create(&user.id, &entry("X"), &user.field_key(), Utc::now()).unwrap();
        vault.insert(&record).await.unwrap();

        assert!(vault.delete(&record.id).await.unwrap());
        assert!(vault.find(&record.id).await.unwrap().is_none());
        assert!(!vault.delete(&record.id).await.unwrap());
        assert!(!vault.update(&record).await.unwrap());
    }

    #[tokio::test]
    async fn deleting_the_owner_removes_their_records() {
        let fx = fixture().await;
        let user = registered(&fx, "e@example.com").await;
        let vault = fx.records.for_owner(&user.id);

        for app in ["A", "B", "C"] {
            let record =
                VaultRecord::create(&user.id, &entry(app), &user.field_key(), Utc::now()).unwrap();
            vault.insert(&record).await.unwrap();
        }
        assert_eq!(vault.list().await.unwrap().len(), 3);

        fx.users.delete(&user.id).await.unwrap();
        assert!(vault.list().await.unwrap().is_empty());
    }
}
