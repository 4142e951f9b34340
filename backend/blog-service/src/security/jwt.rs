/// Access tokens for the blog API.
///
/// Tokens are HS256-signed with `JWT_SECRET` and carry the user's id,
/// superuser flag and permission codenames so the identity middleware can
/// build a [`Principal`] without a database round-trip.
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::middleware::permissions::{Permission, Principal};
use crate::models::UserId;

const JWT_ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    pub username: String,
    pub is_superuser: bool,
    /// Permission codenames, e.g. `post.change_post`
    pub perms: Vec<String>,
    pub iat: i64,
    pub exp: i64,
}

pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
}

impl JwtKeys {
    pub fn new(secret: &str, ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    pub fn issue(&self, principal: &Principal) -> Result<String> {
        let now = Utc::now().timestamp();
        let mut perms: Vec<String> = principal
            .permissions
            .iter()
            .map(|p| p.codename().to_string())
            .collect();
        perms.sort();

        let claims = Claims {
            sub: principal.id.0.to_string(),
            username: principal.username.clone(),
            is_superuser: principal.is_superuser,
            perms,
            iat: now,
            exp: now + self.ttl_secs,
        };

        encode(&Header::new(JWT_ALGORITHM), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Result<Principal> {
        let mut validation = Validation::new(JWT_ALGORITHM);
        validation.validate_exp = true;
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|e| AppError::Unauthorized(format!("Invalid or expired token: {}", e)))?;
        let claims = data.claims;

        let id = claims
            .sub
            .parse::<i64>()
            .map_err(|_| AppError::Unauthorized("Invalid user id in token".to_string()))?;

        // Unknown codenames are dropped rather than rejecting the token.
        let permissions = claims
            .perms
            .iter()
            .filter_map(|c| Permission::from_codename(c))
            .collect();

        Ok(Principal {
            id: UserId(id),
            username: claims.username,
            is_superuser: claims.is_superuser,
            permissions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::permissions::DEFAULT_USER_PERMISSIONS;

    fn principal() -> Principal {
        Principal {
            id: UserId(12),
            username: "alice".into(),
            is_superuser: false,
            permissions: DEFAULT_USER_PERMISSIONS.iter().copied().collect(),
        }
    }

    #[test]
    fn issued_token_verifies() {
        let keys = JwtKeys::new("test-secret", 3600);
        let token = keys.issue(&principal()).unwrap();

        let decoded = keys.verify(&token).unwrap();
        assert_eq!(decoded.id, UserId(12));
        assert_eq!(decoded.username, "alice");
        assert!(!decoded.is_superuser);
        assert!(decoded.has_perm(Permission::ChangePost));
    }

    #[test]
    fn wrong_secret_is_unauthorized() {
        let token = JwtKeys::new("one", 3600).issue(&principal()).unwrap();
        assert!(matches!(
            JwtKeys::new("two", 3600).verify(&token),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn expired_token_is_unauthorized() {
        let keys = JwtKeys::new("test-secret", -120);
        let token = keys.issue(&principal()).unwrap();
        assert!(matches!(keys.verify(&token), Err(AppError::Unauthorized(_))));
    }
}
