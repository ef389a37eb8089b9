// src/handlers/auth.rs

use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::admin::{Admin, LoginRequest},
    utils::{
        hash::{hash_password, verify_password},
        jwt::sign_jwt,
    },
};

/// Authenticates the admin account and returns a session token.
///
/// Unknown usernames and wrong passwords get the same answer.
pub async fn login(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let admin = sqlx::query_as::<_, Admin>(
        "SELECT id, username, password_hash FROM admins WHERE username = $1",
    )
    .bind(&payload.username)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Login DB error: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let invalid = || AppError::AuthError("Invalid username or password".to_string());
    let admin = admin.ok_or_else(invalid)?;

    if !verify_password(&payload.password, &admin.password_hash)? {
        tracing::warn!(username = %payload.username, "Failed admin login");
        return Err(invalid());
    }

    let token = sign_jwt(&admin.username, &config.jwt_secret, config.jwt_expiration)?;
    tracing::info!(username = %admin.username, "Admin logged in");

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "expires_in": config.jwt_expiration,
    })))
}

/// Makes the configured credentials the only admin account.
///
/// Creates the account, or resets its password; any account under another
/// username is removed, so a renamed admin cannot keep logging in.
pub async fn seed_admin(pool: &PgPool, username: &str, password: &str) -> Result<(), AppError> {
    let password_hash = hash_password(password)?;

    let mut tx = pool.begin().await?;

    let removed = sqlx::query("DELETE FROM admins WHERE username <> $1")
        .bind(username)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    sqlx::query(
        r#"
        INSERT INTO admins (username, password_hash)
        VALUES ($1, $2)
        ON CONFLICT (username) DO UPDATE SET password_hash = EXCLUDED.password_hash
        "#,
    )
    .bind(username)
    .bind(password_hash)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    if removed > 0 {
        tracing::warn!("Removed {} admin account(s) other than '{}'", removed, username);
    }
    tracing::info!("Admin account '{}' is ready", username);
    Ok(())
}
