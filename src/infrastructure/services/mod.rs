//! Application services

mod key_management;
mod key_resolver;

pub use key_management::{KeyManagementService, KeySummary, RegisterKeyRequest, UpdateKeyRequest};
pub use key_resolver::KeyResolver;
