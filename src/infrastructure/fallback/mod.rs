//! Process-wide fallback key providers

mod env_provider;

pub use env_provider::EnvFallbackProvider;
