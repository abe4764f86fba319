//! CLI argument definitions for Keystore.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Keystore -- a credential vault with field-level encryption.
#[derive(Parser)]
#[command(
    name = "keystore",
    version,
    about = "Keystore -- credential vault with per-field envelope encryption",
    long_about = "Stores user accounts and their saved credentials. Every sensitive field \
                  is sealed with AES-256-GCM under a key derived from the owner's salt."
)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "config/default.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server.
    Serve {
        /// Address to bind the HTTP server to.
        #[arg(long)]
        bind: Option<String>,

        /// Port to listen on.
        #[arg(long, short)]
        port: Option<u16>,

        /// Path to the SQLite database.
        #[arg(long)]
        database: Option<PathBuf>,
    },

    /// Apply pending schema migrations and exit.
    Migrate {
        /// Path to the SQLite database.
        #[arg(long)]
        database: Option<PathBuf>,
    },
}
