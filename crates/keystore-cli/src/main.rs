//! CLI entry point for Keystore.
//!
//! This binary provides the `keystore` command with subcommands for serving
//! the HTTP API and applying schema migrations.

mod cli;
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use keystore_store::{Database, migration};
use keystore_web::{AppState, TokenIssuer, WebConfig, WebServer};

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing("info");

    let mut config = AppConfig::load(&cli.config)?;

    match cli.command {
        Commands::Serve {
            bind,
            port,
            database,
        } => {
            config.apply_flags(bind, port, database);
            cmd_serve(config).await
        }
        Commands::Migrate { database } => {
            config.apply_flags(None, None, database);
            cmd_migrate(config).await
        }
    }
}

// ---------------------------------------------------------------------------
// Subcommand: serve
// ---------------------------------------------------------------------------

async fn cmd_serve(config: AppConfig) -> Result<()> {
    // Fail before touching the database if the secret is unusable.
    let secret = config.signing_secret()?;
    let tokens = TokenIssuer::new(secret, config.token_ttl()?);

    let db = open_database(&config).await?;

    let server = WebServer::new(
        WebConfig {
            bind_addr: config.bind.clone(),
            port: config.port,
        },
        AppState::new(db, tokens),
    );

    info!(addr = %server.addr(), "keystore ready");
    server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("web server failed")
}

// ---------------------------------------------------------------------------
// Subcommand: migrate
// ---------------------------------------------------------------------------

async fn cmd_migrate(config: AppConfig) -> Result<()> {
    let db = open_database(&config).await?;
    let version = db
        .execute(|conn| migration::current_version(conn))
        .await
        .context("failed to read schema version")?;
    info!(version, "schema is up to date");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn open_database(config: &AppConfig) -> Result<Database> {
    if let Some(parent) = config.database.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let db = Database::open_and_migrate(config.database.clone())
        .await
        .context("failed to open database")?;
    info!(path = %config.database.display(), "store initialized");
    Ok(db)
}

/// Initialize the `tracing` subscriber with an env-filter.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
