//! Caller identity providers

mod jwt;
mod static_identity;

pub use jwt::{JwtIdentityProvider, JwtValidator, SessionClaims};
pub use static_identity::StaticIdentityProvider;
