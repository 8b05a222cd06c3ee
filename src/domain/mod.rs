//! Domain layer - Core business logic and entities

pub mod byok;
pub mod error;
pub mod provider;

pub use byok::{
    FallbackKeyProvider, IdentityProvider, KeySource, KeyStore, ResolutionResult, SecretCipher,
    StoredKey, StoredKeyId, StoredKeyRepository, UsageLogEntry, UserId,
};
pub use error::DomainError;
pub use provider::ProviderName;
