use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::core::error::{is_unique_violation, AppError, Result};
use crate::features::auth::dtos::{
    AdminLoginRequestDto, AuthResponseDto, AuthUserDto, LoginRequestDto, RegisterRequestDto,
};
use crate::features::auth::model::User;
use crate::features::auth::TokenService;

/// Registration, login and the admin session
pub struct AuthService {
    pool: SqlitePool,
    tokens: Arc<TokenService>,
    admin_password: String,
}

impl AuthService {
    pub fn new(pool: SqlitePool, tokens: Arc<TokenService>, admin_password: String) -> Self {
        Self {
            pool,
            tokens,
            admin_password,
        }
    }

    /// Create a user account with an argon2 password hash
    pub async fn register(&self, dto: RegisterRequestDto) -> Result<AuthUserDto> {
        if self.find_by_username(&dto.username).await?.is_some() {
            return Err(AppError::Conflict("Username already exists".to_string()));
        }

        let password = dto.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))??;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash, created_at)
            VALUES (?, ?, ?)
            RETURNING id, username, password_hash, created_at
            "#,
        )
        .bind(&dto.username)
        .bind(&password_hash)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Username already exists".to_string())
            } else {
                AppError::Database(e)
            }
        })?;

        info!("User registered: id={}, username={}", user.id, user.username);
        Ok(user.into())
    }

    /// Verify credentials and issue a user token
    pub async fn login(&self, dto: LoginRequestDto) -> Result<AuthResponseDto> {
        let invalid = || AppError::Unauthorized("Invalid credentials".to_string());

        let user = self
            .find_by_username(&dto.username)
            .await?
            .ok_or_else(invalid)?;

        let password = dto.password;
        let stored_hash = user.password_hash.clone();
        let valid = tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
            .await
            .map_err(|e| AppError::Internal(format!("Password check task failed: {}", e)))?;

        if !valid {
            return Err(invalid());
        }

        let access_token = self.tokens.issue_for_user(user.id, &user.username)?;
        Ok(AuthResponseDto {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.tokens.expires_in(),
            user: Some(user.into()),
        })
    }

    /// Exchange the configured admin password for an admin token
    pub fn admin_login(&self, dto: AdminLoginRequestDto) -> Result<AuthResponseDto> {
        if dto.password != self.admin_password {
            warn!("Rejected admin login attempt");
            return Err(AppError::Unauthorized("Invalid admin password".to_string()));
        }

        info!("Admin session issued");
        Ok(AuthResponseDto {
            access_token: self.tokens.issue_for_admin()?,
            token_type: "Bearer".to_string(),
            expires_in: self.tokens.expires_in(),
            user: None,
        })
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to look up user: {:?}", e);
            AppError::Database(e)
        })
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::encode_b64(&rand::random::<[u8; 16]>())
        .map_err(|e| AppError::Internal(format!("Failed to build salt: {}", e)))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Password hash error: {}", e)))
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}
