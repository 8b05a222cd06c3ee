//! Secret handling helpers

use anyhow::Context;
use clap::Args;

use crate::domain::byok::SecretCipher;
use crate::infrastructure::crypto::AesGcmSecretCipher;

#[derive(Args, Debug)]
pub struct EncryptArgs {
    /// Plaintext secret to encrypt
    #[arg(long)]
    pub secret: String,
}

/// Print the stored form of a secret under `encryption.master_key`
pub fn encrypt(args: EncryptArgs) -> anyhow::Result<()> {
    let config = crate::cli::bootstrap();

    let master_key = config
        .encryption
        .master_key
        .as_deref()
        .context("encryption.master_key is not configured")?;
    let cipher = AesGcmSecretCipher::from_base64_key(master_key)?;

    println!("{}", cipher.encrypt(&args.secret)?);
    Ok(())
}

pub fn generate_master_key() -> anyhow::Result<()> {
    println!("{}", AesGcmSecretCipher::generate_master_key());
    Ok(())
}
