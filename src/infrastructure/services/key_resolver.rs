//! Bring-your-own-key resolution
//!
//! Picks the credential for an outbound provider call in trust order:
//! the caller's stored keys, then a caller-supplied transient key, then the
//! process-wide fallback. Every expected failure along the way (no session,
//! a broken key, an unreachable store) degrades to the next stage; running
//! out of stages yields `None`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::domain::byok::{
    exceeds_ceiling, sort_candidates, window_start, FallbackKeyProvider, IdentityProvider,
    KeyStore, ResolutionResult, SecretCipher, StoredKey, StoredKeyId, UsageLogEntry, UserId,
};

#[derive(Debug, Clone)]
pub struct KeyResolver {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn KeyStore>,
    cipher: Arc<dyn SecretCipher>,
    fallback: Arc<dyn FallbackKeyProvider>,
}

impl KeyResolver {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn KeyStore>,
        cipher: Arc<dyn SecretCipher>,
        fallback: Arc<dyn FallbackKeyProvider>,
    ) -> Self {
        Self {
            identity,
            store,
            cipher,
            fallback,
        }
    }

    /// Same collaborators, bound to a request-scoped identity
    pub fn with_identity(&self, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            identity,
            ..self.clone()
        }
    }

    /// Resolve the key to use for `provider`.
    ///
    /// `provider` is passed through as given: stored keys are matched on it
    /// literally and the fallback provider decides how to interpret it.
    #[instrument(skip_all, fields(provider = %provider))]
    pub async fn resolve_key(
        &self,
        provider: &str,
        transient_key: Option<&str>,
    ) -> Option<ResolutionResult> {
        let now = Utc::now();

        if let Some(user_id) = self.current_identity().await {
            if let Some(result) = self.resolve_stored(&user_id, provider, now).await {
                debug!(
                    source = %result.source(),
                    key_id = ?result.key_id().map(|id| id.as_str()),
                    "Resolved stored key"
                );
                return Some(result);
            }
        }

        if let Some(result) = transient_key.and_then(|key| ResolutionResult::transient(key, provider))
        {
            debug!(source = %result.source(), "Resolved transient key");
            return Some(result);
        }

        if let Some(result) = self
            .fallback
            .lookup_fallback(provider)
            .and_then(|key| ResolutionResult::fallback(key, provider))
        {
            debug!(source = %result.source(), "Resolved fallback key");
            return Some(result);
        }

        info!("No key available for provider");
        None
    }

    /// Record a successful use of a stored key without blocking the caller.
    ///
    /// The returned handle may be dropped; failures are logged, never returned.
    pub fn record_usage(&self, key_id: StoredKeyId) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            record_usage_in(store.as_ref(), &key_id).await;
        })
    }

    /// Awaitable form of `record_usage`, with the same error handling
    pub async fn record_usage_inline(&self, key_id: &StoredKeyId) {
        record_usage_in(self.store.as_ref(), key_id).await;
    }

    async fn current_identity(&self) -> Option<UserId> {
        match self.identity.current_identity().await {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "Identity lookup failed, continuing as anonymous");
                None
            }
        }
    }

    async fn resolve_stored(
        &self,
        user_id: &UserId,
        provider: &str,
        now: DateTime<Utc>,
    ) -> Option<ResolutionResult> {
        let mut candidates: Vec<StoredKey> =
            match self.store.find_eligible_keys(user_id, provider, now).await {
                Ok(keys) => keys.into_iter().filter(|k| k.is_eligible_at(now)).collect(),
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "Failed to load stored keys");
                    return None;
                }
            };

        sort_candidates(&mut candidates);

        for candidate in &candidates {
            if self.is_rate_limited(candidate, now).await {
                continue;
            }

            match self.cipher.decrypt(candidate.encrypted_key()) {
                Ok(secret) => {
                    match ResolutionResult::stored(secret, provider, candidate.id().clone()) {
                        Some(result) => return Some(result),
                        None => {
                            warn!(key_id = %candidate.id(), "Stored key decrypted to an empty secret");
                        }
                    }
                }
                Err(e) => {
                    warn!(key_id = %candidate.id(), error = %e, "Skipping stored key that failed to decrypt");
                }
            }
        }

        None
    }

    /// A candidate whose usage cannot be counted is treated as unusable
    async fn is_rate_limited(&self, candidate: &StoredKey, now: DateTime<Utc>) -> bool {
        let Some(ceiling) = candidate.rate_limit() else {
            return false;
        };

        match self
            .store
            .count_recent_usage(candidate.id(), window_start(now))
            .await
        {
            Ok(count) if exceeds_ceiling(count, ceiling) => {
                debug!(key_id = %candidate.id(), count, ceiling, "Stored key is rate limited");
                true
            }
            Ok(_) => false,
            Err(e) => {
                warn!(key_id = %candidate.id(), error = %e, "Failed to count key usage");
                true
            }
        }
    }
}

async fn record_usage_in(store: &dyn KeyStore, key_id: &StoredKeyId) {
    let entry = UsageLogEntry::now(key_id.clone());
    let at = entry.timestamp;

    if let Err(e) = store.append_usage(entry).await {
        warn!(key_id = %key_id, error = %e, "Failed to append key usage");
    }

    if let Err(e) = store.touch_last_used(key_id, at).await {
        warn!(key_id = %key_id, error = %e, "Failed to update key last-used");
    }
}
