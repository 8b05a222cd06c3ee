//! In-memory key store implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::byok::{
    sort_candidates, KeyStore, StoredKey, StoredKeyId, StoredKeyRepository, UsageLogEntry, UserId,
};
use crate::domain::DomainError;

/// In-memory implementation of KeyStore and StoredKeyRepository
#[derive(Debug, Default)]
pub struct InMemoryKeyStore {
    keys: Arc<RwLock<HashMap<String, StoredKey>>>,
    usage: Arc<RwLock<Vec<UsageLogEntry>>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with initial keys
    pub fn with_keys(keys: Vec<StoredKey>) -> Self {
        let map = keys
            .into_iter()
            .map(|k| (k.id().as_str().to_string(), k))
            .collect();

        Self {
            keys: Arc::new(RwLock::new(map)),
            usage: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Total usage entries logged for a key
    pub async fn usage_entries(&self, key_id: &StoredKeyId) -> Vec<UsageLogEntry> {
        let usage = self.usage.read().await;
        usage
            .iter()
            .filter(|e| &e.key_id == key_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
    async fn find_eligible_keys(
        &self,
        user_id: &UserId,
        provider: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<StoredKey>, DomainError> {
        let keys = self.keys.read().await;
        let mut eligible: Vec<StoredKey> = keys
            .values()
            .filter(|k| k.user_id() == user_id && k.provider() == provider)
            .filter(|k| k.is_eligible_at(now))
            .cloned()
            .collect();

        sort_candidates(&mut eligible);
        Ok(eligible)
    }

    async fn count_recent_usage(
        &self,
        key_id: &StoredKeyId,
        since: DateTime<Utc>,
    ) -> Result<u64, DomainError> {
        let usage = self.usage.read().await;
        Ok(usage
            .iter()
            .filter(|e| &e.key_id == key_id && e.is_within_window(since))
            .count() as u64)
    }

    async fn append_usage(&self, entry: UsageLogEntry) -> Result<(), DomainError> {
        let mut usage = self.usage.write().await;
        usage.push(entry);
        Ok(())
    }

    async fn touch_last_used(
        &self,
        key_id: &StoredKeyId,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let mut keys = self.keys.write().await;
        let key = keys.get_mut(key_id.as_str()).ok_or_else(|| {
            DomainError::not_found(format!("Stored key '{}' not found", key_id))
        })?;

        key.record_use(at);
        Ok(())
    }
}

#[async_trait]
impl StoredKeyRepository for InMemoryKeyStore {
    async fn create(&self, key: StoredKey) -> Result<StoredKey, DomainError> {
        let mut keys = self.keys.write().await;
        let id = key.id().as_str().to_string();

        if keys.contains_key(&id) {
            return Err(DomainError::conflict(format!(
                "Stored key with ID '{}' already exists",
                id
            )));
        }

        keys.insert(id, key.clone());
        Ok(key)
    }

    async fn get(&self, id: &StoredKeyId) -> Result<Option<StoredKey>, DomainError> {
        let keys = self.keys.read().await;
        Ok(keys.get(id.as_str()).cloned())
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<StoredKey>, DomainError> {
        let keys = self.keys.read().await;
        Ok(keys
            .values()
            .filter(|k| k.user_id() == user_id)
            .cloned()
            .collect())
    }

    async fn update(&self, key: StoredKey) -> Result<StoredKey, DomainError> {
        let mut keys = self.keys.write().await;
        let id = key.id().as_str().to_string();

        if !keys.contains_key(&id) {
            return Err(DomainError::not_found(format!(
                "Stored key with ID '{}' not found",
                id
            )));
        }

        keys.insert(id, key.clone());
        Ok(key)
    }

    async fn delete(&self, id: &StoredKeyId) -> Result<bool, DomainError> {
        let mut keys = self.keys.write().await;
        Ok(keys.remove(id.as_str()).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    fn key(id: &str, provider: &str) -> StoredKey {
        StoredKey::new(
            StoredKeyId::new(id).unwrap(),
            user(),
            provider,
            "ciphertext",
            format!("Test {}", id),
        )
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemoryKeyStore::new();
        store.create(key("k1", "openai")).await.unwrap();

        let fetched = store.get(&StoredKeyId::new("k1").unwrap()).await.unwrap();
        assert_eq!(fetched.unwrap().name(), "Test k1");
    }

    #[tokio::test]
    async fn test_create_duplicate() {
        let store = InMemoryKeyStore::new();
        store.create(key("k1", "openai")).await.unwrap();

        let result = store.create(key("k1", "openai")).await;
        assert!(matches!(result, Err(DomainError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_find_eligible_filters_and_orders() {
        let now = Utc::now();
        let other_user = StoredKey::new(
            StoredKeyId::new("other").unwrap(),
            UserId::new("user-2").unwrap(),
            "openai",
            "ciphertext",
            "Other",
        );

        let store = InMemoryKeyStore::with_keys(vec![
            key("low", "openai").with_priority(1),
            key("high", "openai").with_priority(9),
            key("inactive", "openai").with_priority(20).with_active(false),
            key("expired", "openai")
                .with_priority(20)
                .with_expires_at(now - Duration::hours(1)),
            key("anthropic", "anthropic").with_priority(50),
            other_user,
        ]);

        let found = store
            .find_eligible_keys(&user(), "openai", now)
            .await
            .unwrap();
        let ids: Vec<&str> = found.iter().map(|k| k.id().as_str()).collect();

        assert_eq!(ids, vec!["high", "low"]);
    }

    #[tokio::test]
    async fn test_count_recent_usage_uses_window() {
        let now = Utc::now();
        let id = StoredKeyId::new("k1").unwrap();
        let store = InMemoryKeyStore::with_keys(vec![key("k1", "openai")]);

        store
            .append_usage(UsageLogEntry::new(id.clone(), now - Duration::minutes(90)))
            .await
            .unwrap();
        store
            .append_usage(UsageLogEntry::new(id.clone(), now - Duration::minutes(30)))
            .await
            .unwrap();
        store
            .append_usage(UsageLogEntry::new(id.clone(), now))
            .await
            .unwrap();

        let count = store
            .count_recent_usage(&id, now - Duration::minutes(60))
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(store.usage_entries(&id).await.len(), 3);
    }

    #[tokio::test]
    async fn test_touch_last_used() {
        let id = StoredKeyId::new("k1").unwrap();
        let store = InMemoryKeyStore::with_keys(vec![key("k1", "openai")]);
        let at = Utc::now();

        store.touch_last_used(&id, at).await.unwrap();

        let updated = store.get(&id).await.unwrap().unwrap();
        assert_eq!(updated.usage_count(), 1);
        assert_eq!(updated.last_used_at(), Some(at));
    }

    #[tokio::test]
    async fn test_touch_missing_key() {
        let store = InMemoryKeyStore::new();
        let result = store
            .touch_last_used(&StoredKeyId::new("missing").unwrap(), Utc::now())
            .await;

        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = InMemoryKeyStore::with_keys(vec![key("k1", "openai")]);
        let id = StoredKeyId::new("k1").unwrap();

        let mut k = store.get(&id).await.unwrap().unwrap();
        k.set_active(false);
        store.update(k).await.unwrap();
        assert!(!store.get(&id).await.unwrap().unwrap().is_active());

        assert!(store.delete(&id).await.unwrap());
        assert!(!store.delete(&id).await.unwrap());
        assert!(store.list_for_user(&user()).await.unwrap().is_empty());
    }
}
