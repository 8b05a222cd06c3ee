//! Outcome of key resolution

use serde::{Deserialize, Serialize};

use super::StoredKeyId;

/// Where a resolved key came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    /// One of the authenticated user's stored keys
    Stored,
    /// Supplied by the caller for this request only
    Transient,
    /// Process-wide fallback configuration
    Fallback,
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stored => write!(f, "stored"),
            Self::Transient => write!(f, "transient"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// The credential chosen for an outbound provider call.
///
/// `key` is never empty and `key_id` is set only for stored keys.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionResult {
    key: String,
    source: KeySource,
    provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_id: Option<StoredKeyId>,
}

impl ResolutionResult {
    fn build(
        key: String,
        source: KeySource,
        provider: &str,
        key_id: Option<StoredKeyId>,
    ) -> Option<Self> {
        if key.is_empty() {
            return None;
        }

        Some(Self {
            key,
            source,
            provider: provider.to_string(),
            key_id,
        })
    }

    pub fn stored(key: impl Into<String>, provider: &str, key_id: StoredKeyId) -> Option<Self> {
        Self::build(key.into(), KeySource::Stored, provider, Some(key_id))
    }

    pub fn transient(key: impl Into<String>, provider: &str) -> Option<Self> {
        Self::build(key.into(), KeySource::Transient, provider, None)
    }

    pub fn fallback(key: impl Into<String>, provider: &str) -> Option<Self> {
        Self::build(key.into(), KeySource::Fallback, provider, None)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn source(&self) -> KeySource {
        self.source
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Stored key to attribute usage to, if any
    pub fn key_id(&self) -> Option<&StoredKeyId> {
        self.key_id.as_ref()
    }

    /// Secret with everything but the last four characters hidden
    pub fn masked_key(&self) -> String {
        mask_secret(&self.key)
    }
}

impl std::fmt::Debug for ResolutionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionResult")
            .field("key", &"[hidden]")
            .field("source", &self.source)
            .field("provider", &self.provider)
            .field("key_id", &self.key_id)
            .finish()
    }
}

/// Last four characters of a secret, used as a non-sensitive hint
pub fn key_hint(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    let start = chars.len().saturating_sub(4);
    chars[start..].iter().collect()
}

pub fn mask_secret(secret: &str) -> String {
    if secret.chars().count() <= 4 {
        return "****".to_string();
    }
    format!("****{}", key_hint(secret))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_key_yields_no_result() {
        assert!(ResolutionResult::transient("", "openai").is_none());
        assert!(ResolutionResult::fallback("", "openai").is_none());
        assert!(
            ResolutionResult::stored("", "openai", StoredKeyId::new("k").unwrap()).is_none()
        );
    }

    #[test]
    fn test_key_id_only_on_stored() {
        let stored =
            ResolutionResult::stored("sk-1", "openai", StoredKeyId::new("k").unwrap()).unwrap();
        assert_eq!(stored.source(), KeySource::Stored);
        assert_eq!(stored.key_id().map(|id| id.as_str()), Some("k"));

        let transient = ResolutionResult::transient("sk-2", "openai").unwrap();
        assert_eq!(transient.source(), KeySource::Transient);
        assert!(transient.key_id().is_none());
    }

    #[test]
    fn test_debug_hides_secret() {
        let result = ResolutionResult::fallback("sk-very-secret", "anthropic").unwrap();
        let debug = format!("{:?}", result);

        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("Fallback"));
    }

    #[test]
    fn test_masking() {
        assert_eq!(mask_secret("sk-abcdef1234"), "****1234");
        assert_eq!(mask_secret("abc"), "****");
        assert_eq!(key_hint("sk-abcdef1234"), "1234");
        assert_eq!(key_hint("ab"), "ab");
    }

    #[test]
    fn test_source_serializes_lowercase() {
        let result = ResolutionResult::transient("sk-abc", "anthropic").unwrap();
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["source"], "transient");
        assert_eq!(json["provider"], "anthropic");
        assert!(json.get("key_id").is_none());
    }
}
