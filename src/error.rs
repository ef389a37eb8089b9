// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::models::question::UnknownQuestionType;

/// Every failure a handler can report. The message becomes the `error`
/// field of the JSON body.
///
/// A repeated submission is not an error; see `SubmissionOutcome::AlreadySubmitted`.
#[derive(Debug)]
pub enum AppError {
    /// 500; the detail is logged, never sent to the client.
    InternalServerError(String),
    BadRequest(String),
    /// 401
    AuthError(String),
    NotFound(String),
    /// 409, e.g. changing the type of an answered question.
    Conflict(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InternalServerError(msg)
            | AppError::BadRequest(msg)
            | AppError::AuthError(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => write!(f, "{} ({})", msg, self.status()),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                "Internal Server Error".to_string()
            }
            AppError::BadRequest(msg)
            | AppError::AuthError(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => msg,
        };

        (status, Json(json!({ "error": error_message }))).into_response()
    }
}

/// Lets `?` work on queries. A `fetch_one` that finds nothing is a 404;
/// everything else is a server error.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("not_found".to_string()),
            other => AppError::InternalServerError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<UnknownQuestionType> for AppError {
    fn from(err: UnknownQuestionType) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

/// Shorthand for the survey-not-found rejection used by every survey lookup.
pub fn survey_not_found() -> AppError {
    AppError::NotFound("not_found".to_string())
}
