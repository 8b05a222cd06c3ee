//! Stored key persistence traits

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{StoredKey, StoredKeyId, UsageLogEntry, UserId};
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Read and usage-accounting access used during key resolution
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KeyStore: Send + Sync + Debug {
    /// Active, unexpired keys for a user and provider in candidate order
    async fn find_eligible_keys(
        &self,
        user_id: &UserId,
        provider: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<StoredKey>, DomainError>;

    /// Number of usage entries for a key strictly newer than `since`
    async fn count_recent_usage(
        &self,
        key_id: &StoredKeyId,
        since: DateTime<Utc>,
    ) -> Result<u64, DomainError>;

    /// Append one usage entry
    async fn append_usage(&self, entry: UsageLogEntry) -> Result<(), DomainError>;

    /// Bump the key's usage counter and last-used timestamp
    async fn touch_last_used(
        &self,
        key_id: &StoredKeyId,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError>;
}

/// CRUD access for key management
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StoredKeyRepository: Send + Sync + Debug {
    async fn create(&self, key: StoredKey) -> Result<StoredKey, DomainError>;

    async fn get(&self, id: &StoredKeyId) -> Result<Option<StoredKey>, DomainError>;

    /// All keys owned by a user, regardless of status
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<StoredKey>, DomainError>;

    async fn update(&self, key: StoredKey) -> Result<StoredKey, DomainError>;

    /// Returns true if a key was deleted
    async fn delete(&self, id: &StoredKeyId) -> Result<bool, DomainError>;
}
