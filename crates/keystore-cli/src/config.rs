//! Server configuration.
//!
//! Layers, lowest precedence first:
//!   1. built-in defaults
//!   2. the `[server]` table of `config/default.toml` (missing file or keys
//!      fall back to the layer below)
//!   3. `KEYSTORE_*` environment variables (`.env` is loaded beforehand)
//!   4. command-line flags

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use keystore_web::SigningSecret;
use keystore_web::auth::DEFAULT_TOKEN_TTL_HOURS;

// ---------------------------------------------------------------------------
// AppConfig
// ---------------------------------------------------------------------------

/// Settings for `keystore serve` and `keystore migrate`.
#[derive(Clone, PartialEq)]
pub struct AppConfig {
    pub bind: String,
    pub port: u16,
    pub database: PathBuf,
    pub token_ttl_hours: i64,
    jwt_secret: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 5000,
            database: PathBuf::from("data/keystore.db"),
            token_ttl_hours: DEFAULT_TOKEN_TTL_HOURS,
            jwt_secret: None,
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind", &self.bind)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("token_ttl_hours", &self.token_ttl_hours)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl AppConfig {
    /// Load defaults, then the config file at `path`, then the process
    /// environment.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::default();

        match std::fs::read_to_string(path) {
            Ok(content) => {
                let table: toml::Table = content
                    .parse()
                    .with_context(|| format!("failed to parse {}", path.display()))?;
                config.apply_file(&table)?;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()));
            }
        }

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply the `[server]` table of a parsed config file.
    pub fn apply_file(&mut self, table: &toml::Table) -> Result<()> {
        let server = match table.get("server") {
            Some(toml::Value::Table(s)) => s,
            Some(_) => bail!("[server] must be a table"),
            None => return Ok(()),
        };

        if let Some(bind) = server.get("bind").and_then(|v| v.as_str()) {
            self.bind = bind.to_owned();
        }
        if let Some(port) = server.get("port").and_then(|v| v.as_integer()) {
            self.port = u16::try_from(port).context("server.port out of range")?;
        }
        if let Some(database) = server.get("database").and_then(|v| v.as_str()) {
            self.database = PathBuf::from(database);
        }
        if let Some(hours) = server.get("token_ttl_hours").and_then(|v| v.as_integer()) {
            self.token_ttl_hours = hours;
        }
        if let Some(secret) = server.get("jwt_secret").and_then(|v| v.as_str()) {
            self.jwt_secret = Some(secret.to_owned());
        }
        Ok(())
    }

    /// Apply `KEYSTORE_*` variables as returned by `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(bind) = lookup("KEYSTORE_BIND") {
            self.bind = bind;
        }
        if let Some(port) = lookup("KEYSTORE_PORT") {
            self.port = port.parse().context("KEYSTORE_PORT must be a port number")?;
        }
        if let Some(database) = lookup("KEYSTORE_DATABASE") {
            self.database = PathBuf::from(database);
        }
        if let Some(hours) = lookup("KEYSTORE_TOKEN_TTL_HOURS") {
            self.token_ttl_hours = hours
                .parse()
                .context("KEYSTORE_TOKEN_TTL_HOURS must be an integer")?;
        }
        if let Some(secret) = lookup("KEYSTORE_JWT_SECRET") {
            self.jwt_secret = Some(secret);
        }
        Ok(())
    }

    /// Apply command-line flags, which win over everything else.
    pub fn apply_flags(&mut self, bind: Option<String>, port: Option<u16>, database: Option<PathBuf>) {
        if let Some(bind) = bind {
            self.bind = bind;
        }
        if let Some(port) = port {
            self.port = port;
        }
        if let Some(database) = database {
            self.database = database;
        }
    }

    /// The token signing secret. Missing or short secrets are fatal.
    pub fn signing_secret(&self) -> Result<SigningSecret> {
        let Some(secret) = self.jwt_secret.as_deref() else {
            bail!("no token signing secret configured; set KEYSTORE_JWT_SECRET");
        };
        SigningSecret::new(secret).context("invalid KEYSTORE_JWT_SECRET")
    }

    pub fn token_ttl(&self) -> Result<chrono::Duration> {
        if self.token_ttl_hours <= 0 {
            bail!("token_ttl_hours must be positive, got {}", self.token_ttl_hours);
        }
        chrono::Duration::try_hours(self.token_ttl_hours).context("token_ttl_hours out of range")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
