//! Supported AI providers

use serde::{Deserialize, Serialize};

/// AI provider a key can be registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    OpenRouter,
    OpenAi,
    Anthropic,
    #[serde(alias = "gemini")]
    Google,
    Mistral,
}

impl ProviderName {
    /// Parse a provider name, accepting `gemini` as an alias for `google`
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openrouter" => Some(Self::OpenRouter),
            "openai" => Some(Self::OpenAi),
            "anthropic" => Some(Self::Anthropic),
            "google" | "gemini" => Some(Self::Google),
            "mistral" => Some(Self::Mistral),
            _ => None,
        }
    }

    pub fn all() -> [Self; 5] {
        [
            Self::OpenRouter,
            Self::OpenAi,
            Self::Anthropic,
            Self::Google,
            Self::Mistral,
        ]
    }

    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenRouter => "openrouter",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
            Self::Mistral => "mistral",
        }
    }

    /// Environment variables holding the process-wide fallback key, checked in order
    pub fn fallback_env_vars(&self) -> &'static [&'static str] {
        match self {
            Self::OpenRouter => &["OPENROUTER_API_KEY"],
            Self::OpenAi => &["OPENAI_API_KEY"],
            Self::Anthropic => &["ANTHROPIC_API_KEY"],
            Self::Google => &["GOOGLE_API_KEY", "GEMINI_API_KEY"],
            Self::Mistral => &["MISTRAL_API_KEY"],
        }
    }
}

impl std::fmt::Display for ProviderName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProviderName {
    type Err = crate::domain::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            crate::domain::DomainError::validation(format!("Unsupported provider: {}", s))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical_names() {
        for provider in ProviderName::all() {
            assert_eq!(ProviderName::parse(provider.as_str()), Some(provider));
        }
    }

    #[test]
    fn test_parse_gemini_alias() {
        assert_eq!(ProviderName::parse("gemini"), Some(ProviderName::Google));
        assert_eq!(ProviderName::parse("Gemini "), Some(ProviderName::Google));
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(ProviderName::parse("cohere"), None);
        assert_eq!(ProviderName::parse(""), None);
        assert!("cohere".parse::<ProviderName>().is_err());
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&ProviderName::OpenRouter).unwrap();
        assert_eq!(json, "\"openrouter\"");

        let parsed: ProviderName = serde_json::from_str("\"gemini\"").unwrap();
        assert_eq!(parsed, ProviderName::Google);
    }

    #[test]
    fn test_google_checks_both_env_vars() {
        assert_eq!(
            ProviderName::Google.fallback_env_vars(),
            &["GOOGLE_API_KEY", "GEMINI_API_KEY"]
        );
    }
}
