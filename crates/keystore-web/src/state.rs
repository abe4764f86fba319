//! Shared application state for the web server.
//!
//! [`AppState`] is wrapped in an `Arc` and shared across all request handlers.
//! It is built once at startup and never mutated afterwards.

use keystore_store::{Database, UserStore, VaultRecordStore};

use crate::auth::TokenIssuer;

/// Shared state accessible from every Axum handler.
#[derive(Clone)]
pub struct AppState {
    /// Database handle, used directly only for health checks.
    pub db: Database,

    /// User account store.
    pub users: UserStore,

    /// Vault record store; handlers always go through `for_owner`.
    pub records: VaultRecordStore,

    /// Issues and verifies bearer tokens.
    pub tokens: TokenIssuer,
}

impl AppState {
    pub fn new(db: Database, tokens: TokenIssuer) -> Self {
        Self {
            users: UserStore::new(db.clone()),
            records: VaultRecordStore::new(db.clone()),
            db,
            tokens,
        }
    }
}
