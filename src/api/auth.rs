//! Bearer-token identity. Tokens are issued elsewhere; this side only verifies them.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header::AUTHORIZATION, request::Parts};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::StorefrontError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(default)]
    pub role: Role,
    pub exp: usize,
}

pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self { key: DecodingKey::from_secret(secret.as_bytes()), validation: Validation::new(Algorithm::HS256) }
    }

    pub fn verify(&self, token: &str) -> crate::Result<Claims> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "rejected bearer token");
                StorefrontError::Unauthorized
            })
    }
}

/// The authenticated caller.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
}

/// An authenticated caller holding the admin role.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub AuthUser);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    Arc<TokenVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StorefrontError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parts.headers.get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or(StorefrontError::Unauthorized)?;
        let claims = Arc::<TokenVerifier>::from_ref(state).verify(token)?;
        Ok(Self { user_id: claims.sub, role: claims.role })
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    Arc<TokenVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StorefrontError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin { return Err(StorefrontError::Forbidden); }
        Ok(Self(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "an-hs256-secret-of-at-least-32-bytes!";

    fn token(claims: &Claims, secret: &str) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn claims(exp_offset: i64) -> Claims {
        Claims { sub: Uuid::new_v4(), role: Role::Admin, exp: (chrono::Utc::now().timestamp() + exp_offset) as usize }
    }

    #[test]
    fn test_valid_token() {
        let c = claims(3600);
        let verified = TokenVerifier::new(SECRET).verify(&token(&c, SECRET)).unwrap();
        assert_eq!(verified.sub, c.sub);
        assert_eq!(verified.role, Role::Admin);
    }

    #[test]
    fn test_wrong_secret_and_expiry_rejected() {
        let verifier = TokenVerifier::new(SECRET);
        assert!(matches!(verifier.verify(&token(&claims(3600), "some-other-secret-of-32-bytes-len")), Err(StorefrontError::Unauthorized)));
        assert!(matches!(verifier.verify(&token(&claims(-3600), SECRET)), Err(StorefrontError::Unauthorized)));
    }

    #[test]
    fn test_role_defaults_to_user() {
        let c: Claims = serde_json::from_str(r#"{"sub":"00000000-0000-0000-0000-000000000001","exp":1}"#).unwrap();
        assert_eq!(c.role, Role::User);
    }
}
