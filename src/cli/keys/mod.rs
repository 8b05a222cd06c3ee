//! Keys command - register and maintain a user's stored keys

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};

use crate::domain::UserId;
use crate::infrastructure::services::{KeySummary, RegisterKeyRequest};

#[derive(Args, Debug)]
pub struct KeysArgs {
    #[command(subcommand)]
    pub command: KeysCommand,
}

#[derive(Subcommand, Debug)]
pub enum KeysCommand {
    /// Store a new key for a user
    Register(RegisterArgs),

    /// List a user's keys without their secrets
    List(OwnerArgs),

    /// Stop a key from being resolved
    Deactivate(KeyRefArgs),

    /// Remove a key
    Delete(KeyRefArgs),
}

#[derive(Args, Debug)]
pub struct RegisterArgs {
    #[arg(long)]
    pub user: String,

    #[arg(long)]
    pub provider: String,

    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub secret: String,

    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub priority: i32,

    #[arg(long)]
    pub primary: bool,

    /// Maximum uses per rolling hour
    #[arg(long)]
    pub rate_limit: Option<u32>,

    /// RFC 3339 timestamp after which the key is ignored
    #[arg(long)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Args, Debug)]
pub struct OwnerArgs {
    #[arg(long)]
    pub user: String,
}

#[derive(Args, Debug)]
pub struct KeyRefArgs {
    #[arg(long)]
    pub user: String,

    /// Stored key id
    #[arg(long)]
    pub id: String,
}

pub async fn run(args: KeysArgs) -> anyhow::Result<()> {
    let config = crate::cli::bootstrap();
    config
        .database
        .url
        .as_ref()
        .context("database.url is required to manage stored keys")?;

    let keys = crate::create_services(&config).await?.keys;

    match args.command {
        KeysCommand::Register(args) => {
            let key = keys
                .register_key(RegisterKeyRequest {
                    user_id: UserId::new(args.user)?,
                    provider: args.provider,
                    name: args.name,
                    secret: args.secret,
                    priority: args.priority,
                    is_primary: args.primary,
                    rate_limit: args.rate_limit,
                    expires_at: args.expires_at,
                })
                .await?;
            print_json(&KeySummary::from_key(&key, Utc::now()))
        }
        KeysCommand::List(args) => {
            let summaries = keys.list_keys(&UserId::new(args.user)?).await?;
            print_json(&summaries)
        }
        KeysCommand::Deactivate(args) => {
            let key = keys
                .deactivate_key(&UserId::new(args.user)?, &args.id)
                .await?;
            print_json(&KeySummary::from_key(&key, Utc::now()))
        }
        KeysCommand::Delete(args) => {
            keys.delete_key(&UserId::new(args.user)?, &args.id).await?;
            println!("Deleted {}", args.id);
            Ok(())
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
