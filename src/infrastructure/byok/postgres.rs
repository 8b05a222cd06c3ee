//! PostgreSQL key store with connection pooling

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::warn;

use crate::domain::byok::{
    KeyStore, StoredKey, StoredKeyId, StoredKeyRepository, UsageLogEntry, UserId,
};
use crate::domain::DomainError;

const KEY_COLUMNS: &str = "id, user_id, provider, encrypted_key, name, key_hint, priority, \
     is_primary, rate_limit, is_active, expires_at, usage_count, last_used_at, created_at, \
     updated_at";

/// PostgreSQL connection configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/offer_analyst".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
        }
    }
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    pub fn with_idle_timeout(mut self, secs: u64) -> Self {
        self.idle_timeout_secs = secs;
        self
    }

    /// Open a connection pool
    pub async fn connect(&self) -> Result<PgPool, DomainError> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(self.connect_timeout_secs))
            .idle_timeout(std::time::Duration::from_secs(self.idle_timeout_secs))
            .connect(&self.url)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to connect to PostgreSQL: {}", e)))
    }
}

/// Key store over the `byok_keys` and `byok_usage_log` tables
#[derive(Clone)]
pub struct PostgresKeyStore {
    pool: PgPool,
}

impl Debug for PostgresKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresKeyStore").finish()
    }
}

impl PostgresKeyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &PostgresConfig) -> Result<Self, DomainError> {
        Ok(Self::new(config.connect().await?))
    }
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, DomainError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| DomainError::storage(format!("Failed to read column '{}': {}", name, e)))
}

fn row_to_key(row: &PgRow) -> Result<StoredKey, DomainError> {
    let id = StoredKeyId::new(column::<String>(row, "id")?)?;
    let user_id = UserId::new(column::<String>(row, "user_id")?)?;
    let provider: String = column(row, "provider")?;
    let encrypted_key: String = column(row, "encrypted_key")?;
    let name: String = column(row, "name")?;
    let rate_limit: Option<i32> = column(row, "rate_limit")?;
    let expires_at: Option<DateTime<Utc>> = column(row, "expires_at")?;
    let usage_count: i64 = column(row, "usage_count")?;

    let mut key = StoredKey::new(id, user_id, provider, encrypted_key, name)
        .with_key_hint(column::<String>(row, "key_hint")?)
        .with_priority(column(row, "priority")?)
        .with_primary(column(row, "is_primary")?)
        .with_active(column(row, "is_active")?)
        .with_created_at(column(row, "created_at")?)
        .with_updated_at(column(row, "updated_at")?)
        .with_usage(
            u64::try_from(usage_count).unwrap_or(0),
            column(row, "last_used_at")?,
        );

    if let Some(limit) = rate_limit {
        let limit = u32::try_from(limit)
            .map_err(|_| DomainError::storage(format!("Invalid rate limit: {}", limit)))?;
        key = key.with_rate_limit(limit);
    }

    if let Some(expires_at) = expires_at {
        key = key.with_expires_at(expires_at);
    }

    Ok(key)
}

/// Decode each row independently; undecodable rows are logged and dropped
fn decode_keys<R>(
    rows: &[R],
    decode: impl Fn(&R) -> Result<StoredKey, DomainError>,
) -> Vec<StoredKey> {
    rows.iter()
        .enumerate()
        .filter_map(|(index, row)| match decode(row) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(row = index, error = %e, "Skipping stored key row that failed to decode");
                None
            }
        })
        .collect()
}

fn rate_limit_param(key: &StoredKey) -> Result<Option<i32>, DomainError> {
    key.rate_limit()
        .map(|limit| {
            i32::try_from(limit)
                .map_err(|_| DomainError::validation(format!("Rate limit too large: {}", limit)))
        })
        .transpose()
}

#[async_trait]
impl KeyStore for PostgresKeyStore {
    async fn find_eligible_keys(
        &self,
        user_id: &UserId,
        provider: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<StoredKey>, DomainError> {
        let query = format!(
            r#"
            SELECT {}
            FROM byok_keys
            WHERE user_id = $1
              AND provider = $2
              AND is_active
              AND (expires_at IS NULL OR expires_at > $3)
            ORDER BY priority DESC, is_primary DESC, created_at DESC, id ASC
            "#,
            KEY_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(user_id.as_str())
            .bind(provider)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to query stored keys: {}", e)))?;

        Ok(decode_keys(&rows, row_to_key))
    }

    async fn count_recent_usage(
        &self,
        key_id: &StoredKeyId,
        since: DateTime<Utc>,
    ) -> Result<u64, DomainError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM byok_usage_log WHERE key_id = $1 AND used_at > $2",
        )
        .bind(key_id.as_str())
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to count key usage: {}", e)))?;

        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn append_usage(&self, entry: UsageLogEntry) -> Result<(), DomainError> {
        sqlx::query("INSERT INTO byok_usage_log (key_id, used_at) VALUES ($1, $2)")
            .bind(entry.key_id.as_str())
            .bind(entry.timestamp)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to append key usage: {}", e)))?;

        Ok(())
    }

    async fn touch_last_used(
        &self,
        key_id: &StoredKeyId,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE byok_keys
            SET usage_count = usage_count + 1, last_used_at = $2
            WHERE id = $1
            "#,
        )
        .bind(key_id.as_str())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to update key usage: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!(
                "Stored key '{}' not found",
                key_id
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl StoredKeyRepository for PostgresKeyStore {
    async fn create(&self, key: StoredKey) -> Result<StoredKey, DomainError> {
        let query = format!(
            r#"
            INSERT INTO byok_keys ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
            KEY_COLUMNS
        );

        sqlx::query(&query)
            .bind(key.id().as_str())
            .bind(key.user_id().as_str())
            .bind(key.provider())
            .bind(key.encrypted_key())
            .bind(key.name())
            .bind(key.key_hint())
            .bind(key.priority())
            .bind(key.is_primary())
            .bind(rate_limit_param(&key)?)
            .bind(key.is_active())
            .bind(key.expires_at())
            .bind(i64::try_from(key.usage_count()).unwrap_or(i64::MAX))
            .bind(key.last_used_at())
            .bind(key.created_at())
            .bind(key.updated_at())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if e.to_string().contains("duplicate key") {
                    DomainError::conflict(format!(
                        "Stored key with ID '{}' already exists",
                        key.id()
                    ))
                } else {
                    DomainError::storage(format!("Failed to create stored key: {}", e))
                }
            })?;

        Ok(key)
    }

    async fn get(&self, id: &StoredKeyId) -> Result<Option<StoredKey>, DomainError> {
        let query = format!("SELECT {} FROM byok_keys WHERE id = $1", KEY_COLUMNS);

        let row = sqlx::query(&query)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get stored key: {}", e)))?;

        row.as_ref().map(row_to_key).transpose()
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<StoredKey>, DomainError> {
        let query = format!(
            "SELECT {} FROM byok_keys WHERE user_id = $1 ORDER BY created_at",
            KEY_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(user_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to list stored keys: {}", e)))?;

        Ok(decode_keys(&rows, row_to_key))
    }

    async fn update(&self, key: StoredKey) -> Result<StoredKey, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE byok_keys
            SET name = $2, priority = $3, is_primary = $4, rate_limit = $5,
                is_active = $6, expires_at = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(key.id().as_str())
        .bind(key.name())
        .bind(key.priority())
        .bind(key.is_primary())
        .bind(rate_limit_param(&key)?)
        .bind(key.is_active())
        .bind(key.expires_at())
        .bind(key.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to update stored key: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!(
                "Stored key with ID '{}' not found",
                key.id()
            )));
        }

        Ok(key)
    }

    async fn delete(&self, id: &StoredKeyId) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM byok_keys WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to delete stored key: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_config_default() {
        let config = PostgresConfig::default();

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.connect_timeout_secs, 30);
        assert_eq!(config.idle_timeout_secs, 600);
    }

    #[test]
    fn test_postgres_config_builder() {
        let config = PostgresConfig::new("postgres://localhost/test")
            .with_max_connections(20)
            .with_min_connections(5)
            .with_connect_timeout(60)
            .with_idle_timeout(300);

        assert_eq!(config.url, "postgres://localhost/test");
        assert_eq!(config.max_connections, 20);
        assert_eq!(config.min_connections, 5);
        assert_eq!(config.connect_timeout_secs, 60);
        assert_eq!(config.idle_timeout_secs, 300);
    }

    #[test]
    fn test_rate_limit_param_conversion() {
        let key = StoredKey::new(
            StoredKeyId::new("k1").unwrap(),
            UserId::new("u1").unwrap(),
            "openai",
            "ct",
            "Key",
        );
        assert_eq!(rate_limit_param(&key).unwrap(), None);
        assert_eq!(
            rate_limit_param(&key.clone().with_rate_limit(10)).unwrap(),
            Some(10)
        );
        assert!(rate_limit_param(&key.with_rate_limit(u32::MAX)).is_err());
    }

    #[test]
    fn test_decode_keys_skips_bad_rows() {
        let rows = vec![("k1", 10), ("bad id", 10), ("k3", -1), ("k4", 0)];

        let keys = decode_keys(&rows, |(id, limit)| {
            let limit = u32::try_from(*limit)
                .map_err(|_| DomainError::storage(format!("Invalid rate limit: {}", limit)))?;
            let key = StoredKey::new(
                StoredKeyId::new(*id)?,
                UserId::new("u1")?,
                "openai",
                "ct",
                "Key",
            );
            Ok(if limit > 0 { key.with_rate_limit(limit) } else { key })
        });

        let ids: Vec<&str> = keys.iter().map(|k| k.id().as_str()).collect();
        assert_eq!(ids, vec!["k1", "k4"]);
        assert_eq!(keys[0].rate_limit(), Some(10));
    }
}
