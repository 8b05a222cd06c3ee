//! Infrastructure layer - External service implementations

pub mod byok;
pub mod crypto;
pub mod fallback;
pub mod identity;
pub mod logging;
pub mod services;
