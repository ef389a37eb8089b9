// src/utils/api_token.rs

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::{config::Config, error::AppError};

pub const API_TOKEN_HEADER: &str = "x-api-token";
pub const API_TOKEN_QUERY: &str = "api_token";

/// Axum Middleware: static API token.
///
/// Accepts the token from the `X-API-Token` header or the `api_token`
/// query parameter; anything else is answered with 401.
pub async fn api_token_middleware(
    State(config): State<Config>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    if !has_valid_token(&req, &config.api_token) {
        return Err(AppError::AuthError("unauthorized".to_string()));
    }

    Ok(next.run(req).await)
}

fn has_valid_token(req: &Request<Body>, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }

    let from_header = req
        .headers()
        .get(API_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|token| token == expected);

    from_header
        || req.uri().query().is_some_and(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .any(|(key, value)| key == API_TOKEN_QUERY && value == expected)
        })
}
