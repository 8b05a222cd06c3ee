//! Bearer-token identity backed by HS256 JWTs

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::domain::byok::{IdentityProvider, UserId};
use crate::domain::DomainError;

/// Session claims issued by the web application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration timestamp (Unix epoch)
    pub exp: i64,
}

/// Validates session tokens against a shared secret
#[derive(Clone)]
pub struct JwtValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl Debug for JwtValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtValidator")
            .field("decoding_key", &"[hidden]")
            .finish()
    }
}

impl JwtValidator {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn validate(&self, token: &str) -> Result<SessionClaims, DomainError> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| DomainError::identity(format!("Invalid session token: {}", e)))?;

        Ok(data.claims)
    }
}

/// Identity of the caller presenting an optional bearer token
#[derive(Debug, Clone)]
pub struct JwtIdentityProvider {
    validator: JwtValidator,
    token: Option<String>,
}

impl JwtIdentityProvider {
    pub fn new(validator: JwtValidator, token: Option<String>) -> Self {
        Self { validator, token }
    }

    /// Accepts a raw `Authorization` header value
    pub fn from_authorization_header(validator: JwtValidator, header: Option<&str>) -> Self {
        let token = header
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        Self::new(validator, token)
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn current_identity(&self) -> Result<Option<UserId>, DomainError> {
        let Some(token) = self.token.as_deref() else {
            return Ok(None);
        };

        let claims = self.validator.validate(token)?;
        UserId::new(claims.sub)
            .map(Some)
            .map_err(|e| DomainError::identity(format!("Unusable session subject: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-session-secret";

    fn token(sub: &str, exp_offset: Duration, secret: &str) -> String {
        let claims = SessionClaims {
            sub: sub.to_string(),
            exp: (Utc::now() + exp_offset).timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_valid_token_yields_user() {
        let provider = JwtIdentityProvider::new(
            JwtValidator::new(SECRET),
            Some(token("user-42", Duration::hours(1), SECRET)),
        );

        let identity = provider.current_identity().await.unwrap();
        assert_eq!(identity.unwrap().as_str(), "user-42");
    }

    #[tokio::test]
    async fn test_missing_token_is_anonymous() {
        let provider = JwtIdentityProvider::new(JwtValidator::new(SECRET), None);
        assert!(provider.current_identity().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_wrong_secret_is_error() {
        let provider = JwtIdentityProvider::new(
            JwtValidator::new(SECRET),
            Some(token("user-42", Duration::hours(1), "other-secret")),
        );

        let result = provider.current_identity().await;
        assert!(matches!(result, Err(DomainError::Identity { .. })));
    }

    #[tokio::test]
    async fn test_expired_token_is_error() {
        let provider = JwtIdentityProvider::new(
            JwtValidator::new(SECRET),
            Some(token("user-42", Duration::hours(-2), SECRET)),
        );

        assert!(provider.current_identity().await.is_err());
    }

    #[tokio::test]
    async fn test_authorization_header_parsing() {
        let header = format!("Bearer {}", token("user-7", Duration::hours(1), SECRET));
        let provider =
            JwtIdentityProvider::from_authorization_header(JwtValidator::new(SECRET), Some(&header));
        assert_eq!(
            provider.current_identity().await.unwrap().unwrap().as_str(),
            "user-7"
        );

        let provider =
            JwtIdentityProvider::from_authorization_header(JwtValidator::new(SECRET), Some("Basic abc"));
        assert!(provider.current_identity().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_external_subject_formats_accepted() {
        for sub in ["auth0|123", "someone@example.com"] {
            let provider = JwtIdentityProvider::new(
                JwtValidator::new(SECRET),
                Some(token(sub, Duration::hours(1), SECRET)),
            );

            let identity = provider.current_identity().await.unwrap();
            assert_eq!(identity.unwrap().as_str(), sub);
        }
    }

    #[tokio::test]
    async fn test_unusable_subject_is_identity_error() {
        let provider = JwtIdentityProvider::new(
            JwtValidator::new(SECRET),
            Some(token("two words", Duration::hours(1), SECRET)),
        );

        let result = provider.current_identity().await;
        assert!(matches!(result, Err(DomainError::Identity { .. })));
    }
}
