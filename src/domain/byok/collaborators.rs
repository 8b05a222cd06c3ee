//! Identity, cipher and fallback collaborators consumed by the resolver

use std::fmt::Debug;

use async_trait::async_trait;

use super::UserId;
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Source of the current caller's identity
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync + Debug {
    /// `Ok(None)` for anonymous callers
    async fn current_identity(&self) -> Result<Option<UserId>, DomainError>;
}

/// Symmetric encryption for stored secrets
#[cfg_attr(test, automock)]
pub trait SecretCipher: Send + Sync + Debug {
    fn encrypt(&self, plaintext: &str) -> Result<String, DomainError>;

    /// Fails with `DomainError::Decryption` on malformed or tampered input
    fn decrypt(&self, ciphertext: &str) -> Result<String, DomainError>;
}

/// Process-wide fallback secrets keyed by provider name
#[cfg_attr(test, automock)]
pub trait FallbackKeyProvider: Send + Sync + Debug {
    /// Looks up the literal provider string; alias handling belongs to implementations
    fn lookup_fallback(&self, provider: &str) -> Option<String>;
}
