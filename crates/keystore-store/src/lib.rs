//! # keystore-store
//!
//! SQLite persistence for Keystore.
//!
//! Holds user accounts and their vault records. Sensitive columns contain
//! only sealed envelopes (see `keystore-vault`); the store never sees a
//! field key except transiently while a caller seals or opens a value.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  UserStore        (users)               │
//! │  VaultRecordStore → OwnerVault          │
//! │                   (vault_records)       │
//! ├─────────────────────────────────────────┤
//! │  Database (rusqlite WAL, foreign keys)  │
//! │  Migrations (versioned, transactional)  │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use keystore_store::{Database, User, UserStore, VaultRecordStore};
//!
//! let db = Database::open_and_migrate("data/keystore.db").await?;
//! let users = UserStore::new(db.clone());
//! let records = VaultRecordStore::new(db);
//!
//! let user = User::register("Alice", "alice@example.com", "hunter22", chrono::Utc::now())?;
//! users.create(&user).await?;
//! let vault = records.for_owner(&user.id);
//! ```

pub mod db;
pub mod error;
pub mod migration;
pub mod password;
pub mod user_store;
pub mod vault_store;

// ── re-exports ───────────────────────────────────────────────────────

pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use user_store::{Profile, User, UserStore};
pub use vault_store::{OwnerVault, VaultRecordStore};
