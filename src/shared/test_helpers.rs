#[cfg(test)]
use crate::features::auth::model::AuthenticatedUser;

#[cfg(test)]
use crate::shared::constants::{ROLE_ADMIN, ROLE_USER};

#[cfg(test)]
use axum::{extract::Request, middleware::Next, response::Response, Router};

#[cfg(test)]
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

/// Fresh in-memory database with every migration applied.
///
/// A single connection that never idles out, so the in-memory database lives
/// as long as the pool.
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    use std::str::FromStr;

    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .unwrap();
    crate::core::database::run_migrations(&pool).await.unwrap();
    pool
}

/// Insert a user row directly and return its id
#[cfg(test)]
pub async fn create_test_user(pool: &SqlitePool, username: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO users (username, password_hash, created_at) VALUES (?, 'x', ?) RETURNING id",
    )
    .bind(username)
    .bind(chrono::Utc::now())
    .fetch_one(pool)
    .await
    .unwrap()
}

#[cfg(test)]
pub fn create_admin_user() -> AuthenticatedUser {
    AuthenticatedUser {
        user_id: None,
        username: ROLE_ADMIN.to_string(),
        roles: vec![ROLE_ADMIN.to_string()],
    }
}

#[cfg(test)]
pub fn create_regular_user(user_id: i64) -> AuthenticatedUser {
    AuthenticatedUser {
        user_id: Some(user_id),
        username: format!("user{}", user_id),
        roles: vec![ROLE_USER.to_string()],
    }
}

#[cfg(test)]
async fn inject_admin_middleware(mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(create_admin_user());
    next.run(request).await
}

#[cfg(test)]
pub fn with_admin_auth(router: Router) -> Router {
    router.layer(axum::middleware::from_fn(inject_admin_middleware))
}

#[cfg(test)]
pub fn with_user_auth(router: Router, user_id: i64) -> Router {
    router.layer(axum::middleware::from_fn(
        move |mut request: Request, next: Next| async move {
            request
                .extensions_mut()
                .insert(create_regular_user(user_id));
            next.run(request).await
        },
    ))
}
