//! HTTP API for Keystore.
//!
//! This crate exposes accounts and vault entries over a JSON REST API:
//!
//! - `/api/auth/*`: registration, login, profile, password rotation and
//!   account deletion.
//! - `/api/keystore`: create, list, update and delete the caller's entries.
//! - `/api/status`: liveness and database health.
//!
//! Every route except registration, login and status requires a bearer token
//! issued by [`auth::TokenIssuer`] and checked by the [`auth::AuthUser`]
//! extractor.

pub mod account;
pub mod api;
pub mod auth;
pub mod entries;
pub mod error;
pub mod server;
pub mod state;
pub mod validate;

use chrono::{DateTime, SubsecRound, Utc};

pub use auth::{SigningSecret, TokenIssuer};
pub use error::ApiError;
pub use server::{WebServer, router};
pub use state::AppState;

/// Web server configuration.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// The address to bind the HTTP server to.
    pub bind_addr: String,
    /// The port to listen on.
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".into(),
            port: 5000,
        }
    }
}

/// The current instant at the precision the store persists (milliseconds), so
/// a freshly built response matches what a later read returns.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}
