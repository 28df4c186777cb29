use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::core::error::{AppError, Result};
use crate::features::auth::model::{AuthenticatedUser, Claims};
use crate::shared::constants::{ROLE_ADMIN, ROLE_USER};

/// Issues and validates HS256 bearer tokens
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Token lifetime in seconds
    pub fn expires_in(&self) -> i64 {
        i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX)
    }

    pub fn issue_for_user(&self, user_id: i64, username: &str) -> Result<String> {
        self.issue(Some(user_id), username, vec![ROLE_USER.to_string()])
    }

    pub fn issue_for_admin(&self) -> Result<String> {
        self.issue(None, ROLE_ADMIN, vec![ROLE_ADMIN.to_string()])
    }

    fn issue(&self, uid: Option<i64>, subject: &str, roles: Vec<String>) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: subject.to_string(),
            uid,
            roles,
            iat: now,
            exp: now.saturating_add(self.expires_in()),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    pub fn validate(&self, token: &str) -> Result<AuthenticatedUser> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;
        Ok(data.claims.into())
    }
}
