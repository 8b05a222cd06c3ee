//! CLI module for the BYOK key resolver
//!
//! Subcommands:
//! - `resolve`: pick the key an outbound provider call would use
//! - `encrypt` / `generate-master-key`: secret handling helpers
//! - `keys`: manage a user's stored keys (requires a database)
//! - `migrate`: apply or revert the key store schema

pub mod crypto;
pub mod keys;
pub mod migrate;
pub mod resolve;

use clap::{Parser, Subcommand};
use tracing::warn;

use crate::config::AppConfig;
use crate::infrastructure::logging::init_logging;

/// Offer Analyst BYOK - resolve provider credentials for AI calls
#[derive(Parser)]
#[command(name = "offer-analyst-byok")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Resolve the key to use for a provider
    Resolve(resolve::ResolveArgs),

    /// Encrypt a secret with the configured master key
    Encrypt(crypto::EncryptArgs),

    /// Print a fresh base64 master key
    GenerateMasterKey,

    /// Manage stored keys
    Keys(keys::KeysArgs),

    /// Apply or revert database migrations
    Migrate(migrate::MigrateArgs),
}

/// Load `.env` and configuration, then install logging
pub(crate) fn bootstrap() -> AppConfig {
    dotenvy::dotenv().ok();

    let (config, load_error) = match AppConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };
    init_logging(&config.logging);

    if let Some(e) = load_error {
        warn!(error = %e, "Failed to load configuration, using defaults");
    }
    config
}
