//! Schema migration system.
//!
//! Migrations are stored as static SQL strings keyed by version number.
//! The current version is tracked in a `_migrations` table so migrations
//! are idempotent and only run once.

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};

/// A single migration definition.
struct Migration {
    /// Monotonically increasing version number (1, 2, 3, ...).
    version: u32,
    /// Human-readable description.
    description: &'static str,
    /// Raw SQL to execute. May contain multiple statements separated by `;`.
    sql: &'static str,
}

/// All migrations in order. Add new migrations to the end of this array.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "users: lookup-id index, encrypted profile fields, immutable salt",
        sql: r#"
            CREATE TABLE users (
                id                    TEXT PRIMARY KEY,
                lookup_id             TEXT NOT NULL UNIQUE,
                name                  TEXT NOT NULL,
                email                 TEXT NOT NULL,
                avatar                TEXT,
                verified              BOOLEAN NOT NULL DEFAULT 0,
                password_hash         TEXT NOT NULL,
                encryption_salt       TEXT NOT NULL,
                credential_changed_at INTEGER,
                created_at            INTEGER NOT NULL,
                updated_at            INTEGER NOT NULL
            );

            CREATE TRIGGER users_lookup_id_immutable
            BEFORE UPDATE OF lookup_id ON users
            WHEN NEW.lookup_id IS NOT OLD.lookup_id
            BEGIN
                SELECT RAISE(ABORT, 'lookup_id is immutable');
            END;

            CREATE TRIGGER users_salt_immutable
            BEFORE UPDATE OF encryption_salt ON users
            WHEN NEW.encryption_salt IS NOT OLD.encryption_salt
            BEGIN
                SELECT RAISE(ABORT, 'encryption_salt is immutable');
            END;

            CREATE TRIGGER users_credential_changed_monotonic
            BEFORE UPDATE OF credential_changed_at ON users
            WHEN OLD.credential_changed_at IS NOT NULL
             AND (NEW.credential_changed_at IS NULL
                  OR NEW.credential_changed_at < OLD.credential_changed_at)
            BEGIN
                SELECT RAISE(ABORT, 'credential_changed_at must not move backwards');
            END;
        "#,
    },
    Migration {
        version: 2,
        description: "vault_records: owner-scoped encrypted credential entries",
        sql: r#"
            CREATE TABLE vault_records (
                id              TEXT PRIMARY KEY,
                owner_id        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                app             TEXT NOT NULL,
                email           TEXT NOT NULL,
                username        TEXT NOT NULL,
                password        TEXT NOT NULL,
                authenticator   TEXT NOT NULL,
                last_changed_at INTEGER NOT NULL,
                created_at      INTEGER NOT NULL,
                updated_at      INTEGER NOT NULL
            );
            CREATE INDEX idx_vault_records_owner ON vault_records(owner_id);

            CREATE TRIGGER vault_records_owner_immutable
            BEFORE UPDATE OF owner_id ON vault_records
            WHEN NEW.owner_id IS NOT OLD.owner_id
            BEGIN
                SELECT RAISE(ABORT, 'owner_id is immutable');
            END;
        "#,
    },
];

// ── public API ───────────────────────────────────────────────────────

/// Latest schema version known to this build.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

/// Run all pending migrations against `conn`, each in its own transaction.
///
/// This is a **synchronous** function; call it from `spawn_blocking`.
pub fn run_all(conn: &mut Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version     INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at  INTEGER NOT NULL
        );",
    )
    .map_err(|e| StoreError::Migration {
        version: 0,
        message: format!("failed to create _migrations table: {e}"),
    })?;

    let current = current_version(conn)?;
    let pending = MIGRATIONS.iter().filter(|m| m.version > current);

    let mut applied = 0usize;
    for migration in pending {
        apply(conn, migration)?;
        applied += 1;
    }

    if applied == 0 {
        debug!(current_version = current, "database schema is up to date");
    } else {
        info!(applied, new_version = latest_version(), "migrations applied");
    }
    Ok(())
}

/// Return the latest applied migration version, or 0 if none.
pub fn current_version(conn: &Connection) -> StoreResult<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |row| row.get(0),
    )
    .map_err(|e| StoreError::Migration {
        version: 0,
        message: format!("failed to read current version: {e}"),
    })
}

// ── internals ────────────────────────────────────────────────────────

fn apply(conn: &mut Connection, migration: &Migration) -> StoreResult<()> {
    info!(
        version = migration.version,
        description = migration.description,
        "applying migration"
    );

    let failed = |message: String| StoreError::Migration {
        version: migration.version,
        message,
    };

    // Dropping the transaction without commit rolls it back.
    let tx = conn
        .transaction()
        .map_err(|e| failed(format!("failed to begin transaction: {e}")))?;

    if let Err(e) = tx.execute_batch(migration.sql) {
        warn!(version = migration.version, error = %e, "migration failed, rolling back");
        return Err(failed(format!("SQL execution failed: {e}")));
    }

    tx.execute(
        "INSERT INTO _migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![
            migration.version,
            migration.description,
            chrono::Utc::now().timestamp_millis()
        ],
    )
    .map_err(|e| failed(format!("failed to record migration: {e}")))?;

    tx.commit()
        .map_err(|e| failed(format!("failed to commit: {e}")))
}

// ── tests ────────────────────────────────────────────────────────────
