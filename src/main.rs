use clap::Parser;
use offer_analyst_byok::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Resolve(args) => cli::resolve::run(args).await,
        Command::Encrypt(args) => cli::crypto::encrypt(args),
        Command::GenerateMasterKey => cli::crypto::generate_master_key(),
        Command::Keys(args) => cli::keys::run(args).await,
        Command::Migrate(args) => cli::migrate::run(args).await,
    }
}
