//! Offer Analyst BYOK
//!
//! Chooses which credential an outbound AI provider call should use:
//! - the signed-in user's stored keys, by priority, primary flag and recency,
//!   skipping keys over their rolling-hour rate limit
//! - a transient key supplied by the caller
//! - a process-wide fallback key
//!
//! Usage of stored keys is recorded after the fact as best-effort telemetry.

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use domain::byok::{
    FallbackKeyProvider, IdentityProvider, KeyStore, SecretCipher, StoredKeyRepository,
};
use infrastructure::{
    byok::{InMemoryKeyStore, PostgresConfig, PostgresKeyStore},
    crypto::AesGcmSecretCipher,
    fallback::EnvFallbackProvider,
    identity::StaticIdentityProvider,
    services::{KeyManagementService, KeyResolver},
};
use tracing::{info, warn};

/// Resolver and key management wired to the configured backends
#[derive(Debug)]
pub struct ByokServices {
    pub resolver: KeyResolver,
    pub keys: KeyManagementService<dyn StoredKeyRepository>,
}

/// Build the services from configuration.
///
/// The resolver starts out anonymous; bind a caller with `KeyResolver::with_identity`.
pub async fn create_services(config: &AppConfig) -> anyhow::Result<ByokServices> {
    let (store, repository): (Arc<dyn KeyStore>, Arc<dyn StoredKeyRepository>) =
        match &config.database.url {
            Some(url) => {
                info!("Using PostgreSQL key store");
                let pg_config =
                    PostgresConfig::new(url).with_max_connections(config.database.max_connections);
                let store = Arc::new(PostgresKeyStore::connect(&pg_config).await?);
                let key_store: Arc<dyn KeyStore> = store.clone();
                let repository: Arc<dyn StoredKeyRepository> = store;
                (key_store, repository)
            }
            None => {
                info!("Using in-memory key store");
                let store = Arc::new(InMemoryKeyStore::new());
                let key_store: Arc<dyn KeyStore> = store.clone();
                let repository: Arc<dyn StoredKeyRepository> = store;
                (key_store, repository)
            }
        };

    let cipher: Arc<dyn SecretCipher> = Arc::new(create_cipher(config)?);
    let fallback: Arc<dyn FallbackKeyProvider> =
        Arc::new(EnvFallbackProvider::new().with_configured(&config.fallback));
    let identity: Arc<dyn IdentityProvider> = Arc::new(StaticIdentityProvider::anonymous());

    Ok(ByokServices {
        resolver: KeyResolver::new(identity, store, cipher.clone(), fallback),
        keys: KeyManagementService::new(repository, cipher),
    })
}

/// A persistent store needs a stable master key; the in-memory store may use a throwaway one
fn create_cipher(config: &AppConfig) -> anyhow::Result<AesGcmSecretCipher> {
    match (&config.encryption.master_key, &config.database.url) {
        (Some(key), _) => Ok(AesGcmSecretCipher::from_base64_key(key)?),
        (None, Some(_)) => Err(anyhow::anyhow!(
            "encryption.master_key is required when a database is configured"
        )),
        (None, None) => {
            warn!("No master key configured, using an ephemeral key");
            Ok(AesGcmSecretCipher::from_base64_key(
                &AesGcmSecretCipher::generate_master_key(),
            )?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{KeySource, UserId};
    use crate::infrastructure::services::RegisterKeyRequest;

    #[tokio::test]
    async fn test_in_memory_services_resolve_registered_key() {
        let services = create_services(&AppConfig::default()).await.unwrap();
        let user = UserId::new("user-1").unwrap();

        let key = services
            .keys
            .register_key(RegisterKeyRequest {
                user_id: user.clone(),
                provider: "openai".to_string(),
                name: "Main".to_string(),
                secret: "sk-registered".to_string(),
                priority: 0,
                is_primary: true,
                rate_limit: None,
                expires_at: None,
            })
            .await
            .unwrap();

        let resolver = services
            .resolver
            .with_identity(Arc::new(StaticIdentityProvider::user(user)));
        let result = resolver.resolve_key("openai", None).await.unwrap();

        assert_eq!(result.source(), KeySource::Stored);
        assert_eq!(result.key(), "sk-registered");
        assert_eq!(result.key_id(), Some(key.id()));
    }

    #[test]
    fn test_database_requires_master_key() {
        let mut config = AppConfig::default();
        config.database.url = Some("postgres://localhost/unused".to_string());

        assert!(create_cipher(&config).is_err());
    }

    #[test]
    fn test_invalid_master_key_rejected() {
        let mut config = AppConfig::default();
        config.encryption.master_key = Some("short".to_string());

        assert!(create_cipher(&config).is_err());
    }
}
