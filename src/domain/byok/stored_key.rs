//! Stored provider keys registered by users

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

const MAX_ID_LENGTH: usize = 64;
const MAX_USER_ID_LENGTH: usize = 255;

fn validate_id(kind: &str, id: &str) -> Result<(), DomainError> {
    if id.is_empty() {
        return Err(DomainError::invalid_id(format!("{} cannot be empty", kind)));
    }

    if id.len() > MAX_ID_LENGTH {
        return Err(DomainError::invalid_id(format!(
            "{} cannot exceed {} characters",
            kind, MAX_ID_LENGTH
        )));
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(DomainError::invalid_id(format!(
            "{} can only contain alphanumeric characters, hyphens, and underscores",
            kind
        )));
    }

    Ok(())
}

/// Unique identifier for a stored key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoredKeyId(String);

impl StoredKeyId {
    /// Create a new key ID with validation
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        validate_id("Stored key ID", &id)?;
        Ok(Self(id))
    }

    /// Generate a new unique ID
    pub fn generate() -> Self {
        Self(format!("key-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StoredKeyId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StoredKeyId> for String {
    fn from(id: StoredKeyId) -> Self {
        id.0
    }
}

impl std::fmt::Display for StoredKeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the user owning stored keys
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Accepts opaque subjects such as `auth0|123` or email addresses
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();

        if id.is_empty() {
            return Err(DomainError::invalid_id("User ID cannot be empty"));
        }

        if id.len() > MAX_USER_ID_LENGTH {
            return Err(DomainError::invalid_id(format!(
                "User ID cannot exceed {} bytes",
                MAX_USER_ID_LENGTH
            )));
        }

        if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(DomainError::invalid_id(
                "User ID cannot contain whitespace or control characters",
            ));
        }

        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A credential a user has registered for one provider
///
/// The secret is only ever held encrypted; `key_hint` keeps the last few
/// plaintext characters so listings can identify a key without decrypting it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredKey {
    id: StoredKeyId,
    user_id: UserId,
    provider: String,
    encrypted_key: String,
    name: String,
    #[serde(default)]
    key_hint: String,
    priority: i32,
    is_primary: bool,
    /// Maximum uses per rolling hour
    #[serde(skip_serializing_if = "Option::is_none")]
    rate_limit: Option<u32>,
    is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    usage_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StoredKey {
    /// Create a new active key with default priority
    pub fn new(
        id: StoredKeyId,
        user_id: UserId,
        provider: impl Into<String>,
        encrypted_key: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            provider: provider.into(),
            encrypted_key: encrypted_key.into(),
            name: name.into(),
            key_hint: String::new(),
            priority: 0,
            is_primary: false,
            rate_limit: None,
            is_active: true,
            expires_at: None,
            usage_count: 0,
            last_used_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_primary(mut self, is_primary: bool) -> Self {
        self.is_primary = is_primary;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: u32) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_key_hint(mut self, key_hint: impl Into<String>) -> Self {
        self.key_hint = key_hint.into();
        self
    }

    /// Override the creation timestamp (used when loading from storage)
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Restore usage counters (used when loading from storage)
    pub fn with_usage(mut self, usage_count: u64, last_used_at: Option<DateTime<Utc>>) -> Self {
        self.usage_count = usage_count;
        self.last_used_at = last_used_at;
        self
    }

    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = updated_at;
        self
    }

    // Getters
    pub fn id(&self) -> &StoredKeyId {
        &self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn encrypted_key(&self) -> &str {
        &self.encrypted_key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_hint(&self) -> &str {
        &self.key_hint
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn is_primary(&self) -> bool {
        self.is_primary
    }

    pub fn rate_limit(&self) -> Option<u32> {
        self.rate_limit
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn usage_count(&self) -> u64 {
        self.usage_count
    }

    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.last_used_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|exp| exp <= now).unwrap_or(false)
    }

    /// A key may be used only while active and unexpired
    pub fn is_eligible_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired_at(now)
    }

    pub fn set_active(&mut self, is_active: bool) {
        self.is_active = is_active;
        self.updated_at = Utc::now();
    }

    /// Update user-editable fields
    pub fn update(
        &mut self,
        name: Option<String>,
        priority: Option<i32>,
        is_primary: Option<bool>,
        rate_limit: Option<Option<u32>>,
        expires_at: Option<Option<DateTime<Utc>>>,
        is_active: Option<bool>,
    ) {
        if let Some(n) = name {
            self.name = n;
        }

        if let Some(p) = priority {
            self.priority = p;
        }

        if let Some(primary) = is_primary {
            self.is_primary = primary;
        }

        if let Some(limit) = rate_limit {
            self.rate_limit = limit;
        }

        if let Some(exp) = expires_at {
            self.expires_at = exp;
        }

        if let Some(active) = is_active {
            self.is_active = active;
        }
        self.updated_at = Utc::now();
    }

    /// Bump the denormalized usage counter
    pub fn record_use(&mut self, at: DateTime<Utc>) {
        self.usage_count += 1;
        self.last_used_at = Some(at);
    }
}

/// Candidate ordering for resolution.
///
/// Higher priority first, then primary keys, then the most recently created.
/// The id breaks any remaining tie so the order is total.
pub fn candidate_order(a: &StoredKey, b: &StoredKey) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| b.is_primary.cmp(&a.is_primary))
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

pub fn sort_candidates(keys: &mut [StoredKey]) {
    keys.sort_by(candidate_order);
}
