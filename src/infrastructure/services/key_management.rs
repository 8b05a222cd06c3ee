//! Service for registering and maintaining users' stored keys

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::domain::byok::{
    candidate_order, key_hint, SecretCipher, StoredKey, StoredKeyId, StoredKeyRepository, UserId,
};
use crate::domain::{DomainError, ProviderName};

const MAX_NAME_LENGTH: usize = 100;

/// Request to register a new key
#[derive(Debug, Clone)]
pub struct RegisterKeyRequest {
    pub user_id: UserId,
    pub provider: String,
    pub name: String,
    /// Plaintext secret; encrypted before it is stored
    pub secret: String,
    pub priority: i32,
    pub is_primary: bool,
    /// Maximum uses per rolling hour
    pub rate_limit: Option<u32>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Request to update a key
#[derive(Debug, Clone, Default)]
pub struct UpdateKeyRequest {
    pub name: Option<String>,
    pub priority: Option<i32>,
    pub is_primary: Option<bool>,
    pub rate_limit: Option<Option<u32>>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub is_active: Option<bool>,
}

/// Key listing entry; never carries the secret
#[derive(Debug, Clone, Serialize)]
pub struct KeySummary {
    pub id: String,
    pub provider: String,
    pub name: String,
    pub key_hint: String,
    pub priority: i32,
    pub is_primary: bool,
    pub rate_limit: Option<u32>,
    pub is_active: bool,
    pub expired: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub usage_count: u64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl KeySummary {
    pub fn from_key(key: &StoredKey, now: DateTime<Utc>) -> Self {
        Self {
            id: key.id().to_string(),
            provider: key.provider().to_string(),
            name: key.name().to_string(),
            key_hint: key.key_hint().to_string(),
            priority: key.priority(),
            is_primary: key.is_primary(),
            rate_limit: key.rate_limit(),
            is_active: key.is_active(),
            expired: key.is_expired_at(now),
            expires_at: key.expires_at(),
            usage_count: key.usage_count(),
            last_used_at: key.last_used_at(),
            created_at: key.created_at(),
        }
    }
}

fn validate_name(name: &str) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::validation("Key name cannot be empty"));
    }

    if name.len() > MAX_NAME_LENGTH {
        return Err(DomainError::validation(format!(
            "Key name cannot exceed {} characters",
            MAX_NAME_LENGTH
        )));
    }

    Ok(())
}

fn validate_rate_limit(rate_limit: Option<u32>) -> Result<(), DomainError> {
    if rate_limit == Some(0) {
        return Err(DomainError::validation(
            "Rate limit must be greater than zero",
        ));
    }
    Ok(())
}

fn validate_expiry(expires_at: Option<DateTime<Utc>>) -> Result<(), DomainError> {
    if let Some(exp) = expires_at {
        if exp <= Utc::now() {
            return Err(DomainError::validation(
                "Expiration must be in the future",
            ));
        }
    }
    Ok(())
}

/// Service for managing stored keys
#[derive(Debug)]
pub struct KeyManagementService<R: StoredKeyRepository + ?Sized> {
    repository: Arc<R>,
    cipher: Arc<dyn SecretCipher>,
}

impl<R: StoredKeyRepository + ?Sized> KeyManagementService<R> {
    pub fn new(repository: Arc<R>, cipher: Arc<dyn SecretCipher>) -> Self {
        Self { repository, cipher }
    }

    /// Register a new key, encrypting the secret
    pub async fn register_key(&self, request: RegisterKeyRequest) -> Result<StoredKey, DomainError> {
        let provider = ProviderName::parse(&request.provider).ok_or_else(|| {
            DomainError::validation(format!("Unsupported provider: {}", request.provider))
        })?;
        validate_name(&request.name)?;
        validate_rate_limit(request.rate_limit)?;
        validate_expiry(request.expires_at)?;

        let secret = request.secret.trim();
        if secret.is_empty() {
            return Err(DomainError::validation("API key cannot be empty"));
        }

        let encrypted = self.cipher.encrypt(secret)?;

        let mut key = StoredKey::new(
            StoredKeyId::generate(),
            request.user_id,
            provider.as_str(),
            encrypted,
            request.name.trim(),
        )
        .with_key_hint(key_hint(secret))
        .with_priority(request.priority)
        .with_primary(request.is_primary);

        if let Some(limit) = request.rate_limit {
            key = key.with_rate_limit(limit);
        }

        if let Some(expires_at) = request.expires_at {
            key = key.with_expires_at(expires_at);
        }

        let created = self.repository.create(key).await?;
        info!(
            key_id = %created.id(),
            user_id = %created.user_id(),
            provider = %created.provider(),
            "Registered stored key"
        );

        Ok(created)
    }

    /// List a user's keys grouped by provider in resolution order
    pub async fn list_keys(&self, user_id: &UserId) -> Result<Vec<KeySummary>, DomainError> {
        let mut keys = self.repository.list_for_user(user_id).await?;
        keys.sort_by(|a, b| {
            a.provider()
                .cmp(b.provider())
                .then_with(|| candidate_order(a, b))
        });

        let now = Utc::now();
        Ok(keys.iter().map(|k| KeySummary::from_key(k, now)).collect())
    }

    /// Update a key owned by `user_id`
    pub async fn update_key(
        &self,
        user_id: &UserId,
        id: &str,
        request: UpdateKeyRequest,
    ) -> Result<StoredKey, DomainError> {
        if let Some(name) = &request.name {
            validate_name(name)?;
        }
        if let Some(limit) = request.rate_limit {
            validate_rate_limit(limit)?;
        }
        if let Some(expires_at) = request.expires_at {
            validate_expiry(expires_at)?;
        }

        let mut key = self.get_owned(user_id, id).await?;
        key.update(
            request.name.map(|n| n.trim().to_string()),
            request.priority,
            request.is_primary,
            request.rate_limit,
            request.expires_at,
            request.is_active,
        );

        self.repository.update(key).await
    }

    pub async fn deactivate_key(&self, user_id: &UserId, id: &str) -> Result<StoredKey, DomainError> {
        let mut key = self.get_owned(user_id, id).await?;
        key.set_active(false);

        let updated = self.repository.update(key).await?;
        info!(key_id = %updated.id(), "Deactivated stored key");
        Ok(updated)
    }

    pub async fn delete_key(&self, user_id: &UserId, id: &str) -> Result<(), DomainError> {
        let key = self.get_owned(user_id, id).await?;

        if !self.repository.delete(key.id()).await? {
            return Err(DomainError::not_found(format!("Stored key '{}' not found", id)));
        }

        info!(key_id = %key.id(), "Deleted stored key");
        Ok(())
    }

    /// Keys owned by another user are reported as missing
    async fn get_owned(&self, user_id: &UserId, id: &str) -> Result<StoredKey, DomainError> {
        let key_id = StoredKeyId::new(id)?;

        self.repository
            .get(&key_id)
            .await?
            .filter(|k| k.user_id() == user_id)
            .ok_or_else(|| DomainError::not_found(format!("Stored key '{}' not found", id)))
    }
}
