use async_trait::async_trait;

use crate::domain::byok::{IdentityProvider, UserId};
use crate::domain::DomainError;

/// Identity fixed at construction time
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityProvider {
    user_id: Option<UserId>,
}

impl StaticIdentityProvider {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn current_identity(&self) -> Result<Option<UserId>, DomainError> {
        Ok(self.user_id.clone())
    }
}
