//! Authentication and authorization for the buyer-side API.
//!
//! Buyers authenticate with username/password and receive a JWT bearer
//! token; the `AuthUser` extractor validates it on every request and carries
//! the actor's role and business-type partition. Suppliers never pass
//! through here: the portal authenticates with the opaque per-supplier
//! access token instead.

use axum::{extract::FromRequestParts, http::header, http::request::Parts};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::db::BusinessScope;
use crate::entities::user;
use crate::errors::ServiceError;

const TOKEN_ISSUER: &str = "rfq-api";
const TOKEN_AUDIENCE: &str = "rfq-api-clients";

/// Claim structure for JWT tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (user ID)
    pub username: String,
    pub role: String,
    pub business_type: String,
    pub jti: String, // JWT ID (unique identifier for this token)
    pub iat: i64,    // Issued at time
    pub exp: i64,    // Expiration time
    pub iss: String, // Issuer
    pub aud: String, // Audience
}

/// Authenticated actor extracted from a validated JWT.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: i64,
    pub username: String,
    pub role: String,
    pub business_type: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == user::ROLE_ADMIN
    }

    /// Partition visibility policy for this actor.
    pub fn scope(&self) -> BusinessScope {
        BusinessScope::for_actor(self.is_admin(), &self.business_type)
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("password hashing failed")]
    Hashing,
    #[error("token encoding failed: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => {
                ServiceError::AuthError("invalid username or password".into())
            }
            AuthError::InvalidToken => ServiceError::AuthError("invalid or expired token".into()),
            AuthError::Hashing | AuthError::Encoding(_) => {
                ServiceError::InternalError("authentication backend failure".into())
            }
        }
    }
}

/// Issues and validates bearer tokens, and owns password hashing.
#[derive(Clone)]
pub struct AuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_lifetime: ChronoDuration,
}

impl AuthService {
    pub fn new(jwt_secret: &str, token_lifetime_secs: usize) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            token_lifetime: ChronoDuration::seconds(token_lifetime_secs as i64),
        }
    }

    /// Hash a password with Argon2id and a fresh random salt.
    pub fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        use argon2::password_hash::{rand_core::OsRng, PasswordHasher, SaltString};
        use argon2::Argon2;

        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|_| AuthError::Hashing)
    }

    /// Verify a password against a stored PHC hash string.
    pub fn verify_password(&self, password: &str, stored_hash: &str) -> Result<(), AuthError> {
        use argon2::password_hash::{PasswordHash, PasswordVerifier};
        use argon2::Argon2;

        let parsed = PasswordHash::new(stored_hash).map_err(|_| AuthError::InvalidCredentials)?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| AuthError::InvalidCredentials)
    }

    /// Generate a JWT for a user
    pub fn generate_token(&self, user: &user::Model) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            role: user.role.clone(),
            business_type: user.business_type.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + self.token_lifetime).timestamp(),
            iss: TOKEN_ISSUER.to_string(),
            aud: TOKEN_AUDIENCE.to_string(),
        };

        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding_key,
        )?)
    }

    /// Validate a bearer token and return the actor it identifies.
    pub fn validate_token(&self, token: &str) -> Result<AuthUser, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[TOKEN_AUDIENCE]);
        validation.set_issuer(&[TOKEN_ISSUER]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|_| AuthError::InvalidToken)?;

        let user_id = data
            .claims
            .sub
            .parse::<i64>()
            .map_err(|_| AuthError::InvalidToken)?;

        Ok(AuthUser {
            user_id,
            username: data.claims.username,
            role: data.claims.role,
            business_type: data.claims.business_type,
        })
    }
}

#[axum::async_trait]
impl FromRequestParts<crate::AppState> for AuthUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &crate::AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ServiceError::AuthError("missing Authorization header".into()))?;

        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or_else(|| ServiceError::AuthError("expected a Bearer token".into()))?;

        Ok(state.services.auth.validate_token(token)?)
    }
}

/// Require the extracted actor to be an administrator.
pub fn require_admin(user: &AuthUser) -> Result<(), ServiceError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(
            "administrator privileges required".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_user() -> user::Model {
        user::Model {
            id: 7,
            username: "buyer1".into(),
            password_hash: String::new(),
            role: "user".into(),
            business_type: "oil".into(),
            created_at: Utc::now(),
        }
    }

    fn service() -> AuthService {
        AuthService::new("unit-test-secret-key-that-is-long-enough-for-hs256-use", 3600)
    }

    #[test]
    fn token_round_trip_preserves_actor() {
        let svc = service();
        let token = svc.generate_token(&test_user()).expect("token");
        let actor = svc.validate_token(&token).expect("validate");
        assert_eq!(actor.user_id, 7);
        assert_eq!(actor.username, "buyer1");
        assert_eq!(actor.business_type, "oil");
        assert!(!actor.is_admin());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let svc = service();
        let mut token = svc.generate_token(&test_user()).expect("token");
        token.push('x');
        assert!(svc.validate_token(&token).is_err());
    }

    #[test]
    fn password_hash_verifies_and_rejects() {
        let svc = service();
        let hash = svc.hash_password("s3cret").expect("hash");
        assert!(svc.verify_password("s3cret", &hash).is_ok());
        assert!(svc.verify_password("wrong", &hash).is_err());
    }
}
