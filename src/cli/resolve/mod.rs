//! Resolve command - prints the key a provider call would use

use std::sync::Arc;

use clap::Args;
use serde::Serialize;
use tracing::info;

use crate::config::AppConfig;
use crate::domain::byok::{IdentityProvider, KeySource, ResolutionResult};
use crate::domain::UserId;
use crate::infrastructure::identity::{JwtIdentityProvider, JwtValidator, StaticIdentityProvider};

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Provider name, e.g. openai or anthropic
    #[arg(long)]
    pub provider: String,

    /// Resolve as this user
    #[arg(long, conflicts_with = "token")]
    pub user: Option<String>,

    /// Resolve as the subject of this session token
    #[arg(long)]
    pub token: Option<String>,

    /// Key supplied with the request
    #[arg(long)]
    pub transient_key: Option<String>,

    /// Print the secret instead of a masked hint
    #[arg(long)]
    pub reveal: bool,

    /// Record a use of the chosen stored key
    #[arg(long)]
    pub record: bool,
}

#[derive(Debug, Serialize)]
struct ResolveOutput<'a> {
    provider: &'a str,
    source: KeySource,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_id: Option<&'a str>,
    key: String,
}

impl<'a> ResolveOutput<'a> {
    fn new(result: &'a ResolutionResult, reveal: bool) -> Self {
        Self {
            provider: result.provider(),
            source: result.source(),
            key_id: result.key_id().map(|id| id.as_str()),
            key: if reveal {
                result.key().to_string()
            } else {
                result.masked_key()
            },
        }
    }
}

pub async fn run(args: ResolveArgs) -> anyhow::Result<()> {
    let config = crate::cli::bootstrap();

    let services = crate::create_services(&config).await?;
    let resolver = services
        .resolver
        .with_identity(identity_for(&args, &config)?);

    let Some(result) = resolver
        .resolve_key(&args.provider, args.transient_key.as_deref())
        .await
    else {
        anyhow::bail!("No key available for provider '{}'", args.provider);
    };

    if args.record {
        if let Some(key_id) = result.key_id() {
            // Detached in the resolver; awaited here so the process outlives the write.
            resolver.record_usage(key_id.clone()).await?;
            info!(key_id = %key_id, "Recorded key usage");
        }
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&ResolveOutput::new(&result, args.reveal))?
    );
    Ok(())
}

fn identity_for(
    args: &ResolveArgs,
    config: &AppConfig,
) -> anyhow::Result<Arc<dyn IdentityProvider>> {
    if let Some(user) = &args.user {
        return Ok(Arc::new(StaticIdentityProvider::user(UserId::new(user)?)));
    }

    if let Some(token) = &args.token {
        let secret = config
            .auth
            .jwt_secret
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("auth.jwt_secret is required to validate --token"))?;

        return Ok(Arc::new(JwtIdentityProvider::new(
            JwtValidator::new(secret),
            Some(token.clone()),
        )));
    }

    Ok(Arc::new(StaticIdentityProvider::anonymous()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::byok::StoredKeyId;

    fn args() -> ResolveArgs {
        ResolveArgs {
            provider: "openai".to_string(),
            user: None,
            token: None,
            transient_key: None,
            reveal: false,
            record: false,
        }
    }

    #[test]
    fn test_output_masks_key_by_default() {
        let result = ResolutionResult::stored(
            "sk-secret-1234",
            "openai",
            StoredKeyId::new("key-1").unwrap(),
        )
        .unwrap();

        let output = ResolveOutput::new(&result, false);
        assert_eq!(output.key, "****1234");
        assert_eq!(output.key_id, Some("key-1"));

        let revealed = ResolveOutput::new(&result, true);
        assert_eq!(revealed.key, "sk-secret-1234");
    }

    #[tokio::test]
    async fn test_identity_defaults_to_anonymous() {
        let identity = identity_for(&args(), &AppConfig::default()).unwrap();

        assert_eq!(identity.current_identity().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_identity_from_user_flag() {
        let mut args = args();
        args.user = Some("user-7".to_string());

        let identity = identity_for(&args, &AppConfig::default()).unwrap();

        assert_eq!(
            identity.current_identity().await.unwrap(),
            Some(UserId::new("user-7").unwrap())
        );
    }

    #[test]
    fn test_token_requires_jwt_secret() {
        let mut args = args();
        args.token = Some("token".to_string());

        assert!(identity_for(&args, &AppConfig::default()).is_err());
    }
}
