//! Migrate command - manages the key store schema

use anyhow::Context;
use clap::Args;
use tracing::info;

use crate::infrastructure::byok::{
    revert_byok_migrations, run_byok_migrations, PostgresConfig, PostgresMigrator,
};

#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Revert applied migrations instead of applying pending ones
    #[arg(long)]
    pub revert: bool,
}

pub async fn run(args: MigrateArgs) -> anyhow::Result<()> {
    let config = crate::cli::bootstrap();

    let url = config
        .database
        .url
        .as_deref()
        .context("database.url is required for migrations")?;
    let pool = PostgresConfig::new(url)
        .with_max_connections(config.database.max_connections)
        .connect()
        .await?;

    if args.revert {
        let reverted = revert_byok_migrations(&pool).await?;
        info!(count = reverted, "Reverted migrations");
    } else {
        let applied = run_byok_migrations(&pool).await?;
        info!(count = applied, "Applied migrations");
    }

    let version = PostgresMigrator::new(pool).current_version().await?;
    info!(version = ?version, "Schema version");

    Ok(())
}
