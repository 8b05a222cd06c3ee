use std::collections::HashMap;
use std::env;

use crate::domain::byok::FallbackKeyProvider;
use crate::domain::ProviderName;

/// Fallback keys from configuration, then from provider environment variables.
///
/// Provider names are parsed here, so `gemini` and `google` share one entry and
/// unknown providers never resolve.
#[derive(Debug, Default)]
pub struct EnvFallbackProvider {
    configured: HashMap<ProviderName, String>,
    read_env: bool,
}

impl EnvFallbackProvider {
    /// Provider that reads the standard environment variables
    pub fn new() -> Self {
        Self {
            configured: HashMap::new(),
            read_env: true,
        }
    }

    /// Provider that only serves explicitly configured keys
    pub fn configured_only() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, provider: ProviderName, key: impl Into<String>) -> Self {
        self.configured.insert(provider, key.into());
        self
    }

    /// Add keys from a `provider name -> key` map, ignoring unknown names
    pub fn with_configured(mut self, keys: &HashMap<String, String>) -> Self {
        for (name, key) in keys {
            match ProviderName::parse(name) {
                Some(provider) => {
                    self.configured.insert(provider, key.clone());
                }
                None => {
                    tracing::warn!(provider = %name, "Ignoring fallback key for unknown provider");
                }
            }
        }
        self
    }

    fn read_env_key(provider: ProviderName) -> Option<String> {
        provider
            .fallback_env_vars()
            .iter()
            .filter_map(|var| env::var(var).ok())
            .find(|value| !value.trim().is_empty())
    }
}

impl FallbackKeyProvider for EnvFallbackProvider {
    fn lookup_fallback(&self, provider: &str) -> Option<String> {
        let provider = ProviderName::parse(provider)?;

        if let Some(key) = self.configured.get(&provider) {
            if !key.trim().is_empty() {
                return Some(key.clone());
            }
        }

        if self.read_env {
            return Self::read_env_key(provider);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_key() {
        let provider = EnvFallbackProvider::configured_only().with_key(ProviderName::OpenAi, "sk-fb");

        assert_eq!(provider.lookup_fallback("openai"), Some("sk-fb".to_string()));
        assert_eq!(provider.lookup_fallback("anthropic"), None);
    }

    #[test]
    fn test_alias_resolves_in_provider() {
        let mut keys = HashMap::new();
        keys.insert("gemini".to_string(), "g-key".to_string());
        let provider = EnvFallbackProvider::configured_only().with_configured(&keys);

        assert_eq!(provider.lookup_fallback("google"), Some("g-key".to_string()));
        assert_eq!(provider.lookup_fallback("gemini"), Some("g-key".to_string()));
    }

    #[test]
    fn test_unknown_provider_never_resolves() {
        let mut keys = HashMap::new();
        keys.insert("cohere".to_string(), "c-key".to_string());
        let provider = EnvFallbackProvider::configured_only().with_configured(&keys);

        assert_eq!(provider.lookup_fallback("cohere"), None);
    }

    #[test]
    fn test_empty_configured_value_is_absent() {
        let provider = EnvFallbackProvider::configured_only().with_key(ProviderName::Mistral, "  ");

        assert_eq!(provider.lookup_fallback("mistral"), None);
    }

    #[test]
    fn test_reads_environment() {
        // SAFETY: Test runs in isolation
        unsafe { env::set_var("OPENROUTER_API_KEY", "or-env-key") };

        let provider = EnvFallbackProvider::new();
        assert_eq!(
            provider.lookup_fallback("openrouter"),
            Some("or-env-key".to_string())
        );

        // SAFETY: Test cleanup
        unsafe { env::remove_var("OPENROUTER_API_KEY") };
    }

    #[test]
    fn test_configured_value_wins_over_environment() {
        // SAFETY: Test runs in isolation
        unsafe { env::set_var("MISTRAL_API_KEY", "env-value") };

        let provider = EnvFallbackProvider::new().with_key(ProviderName::Mistral, "config-value");
        assert_eq!(
            provider.lookup_fallback("mistral"),
            Some("config-value".to_string())
        );

        // SAFETY: Test cleanup
        unsafe { env::remove_var("MISTRAL_API_KEY") };
    }
}
