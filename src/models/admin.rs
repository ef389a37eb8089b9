// src/models/admin.rs

use serde::Deserialize;
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'admins' table. There is a single shared account in practice.
#[derive(Debug, Clone, FromRow)]
pub struct Admin {
    pub id: i64,
    pub username: String,
    /// Argon2 password hash.
    pub password_hash: String,
}

/// DTO for admin login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}
