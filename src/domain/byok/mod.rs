//! Bring-your-own-key domain: stored keys, usage log and resolution results

mod collaborators;
mod repository;
mod resolution;
mod stored_key;
mod usage;

pub use collaborators::{FallbackKeyProvider, IdentityProvider, SecretCipher};
pub use repository::{KeyStore, StoredKeyRepository};
pub use resolution::{key_hint, mask_secret, KeySource, ResolutionResult};
pub use stored_key::{candidate_order, sort_candidates, StoredKey, StoredKeyId, UserId};
pub use usage::{
    exceeds_ceiling, rate_limit_window, window_start, UsageLogEntry, RATE_LIMIT_WINDOW_MINUTES,
};

#[cfg(test)]
pub use collaborators::{MockFallbackKeyProvider, MockIdentityProvider, MockSecretCipher};
#[cfg(test)]
pub use repository::{MockKeyStore, MockStoredKeyRepository};
