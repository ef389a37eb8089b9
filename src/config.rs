// src/config.rs

use std::env;
use dotenvy::dotenv;

/// Token-bucket settings for the submission routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitRateLimit {
    /// Seconds until one more request is allowed.
    pub replenish_seconds: u64,
    /// Requests allowed in a burst.
    pub burst: u32,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Lifetime of an admin session token, in seconds.
    pub jwt_expiration: u64,
    pub api_token: String,
    pub rust_log: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    /// Disables per-identity deduplication of responses.
    pub allow_multiple_responses: bool,
    /// Take the respondent address from `X-Forwarded-For` instead of the socket peer.
    pub trust_forwarded_for: bool,
    pub port: u16,
    pub submit_rate_limit: Option<SubmitRateLimit>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let api_token = env::var("API_TOKEN")
            .expect("API_TOKEN must be set");

        let jwt_expiration = parse_or("JWT_EXPIRATION", 3600);

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let admin_username = env::var("ADMIN_USERNAME").ok().filter(|s| !s.is_empty());
        let admin_password = env::var("ADMIN_PASSWORD").ok().filter(|s| !s.is_empty());

        let burst: u32 = parse_or("SUBMIT_RATE_BURST", 5);
        let submit_rate_limit = (burst > 0).then(|| SubmitRateLimit {
            replenish_seconds: parse_or("SUBMIT_RATE_REPLENISH_SECS", 12),
            burst,
        });

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            api_token,
            rust_log,
            admin_username,
            admin_password,
            allow_multiple_responses: flag("ALLOW_MULTIPLE_RESPONSES"),
            trust_forwarded_for: flag("TRUST_FORWARDED_FOR"),
            port: parse_or("PORT", 3000),
            submit_rate_limit,
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            panic!("{key} has an invalid value: {raw}");
        }),
        Err(_) => default,
    }
}

fn flag(key: &str) -> bool {
    env::var(key)
        .map(|v| parse_flag(&v))
        .unwrap_or(false)
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
