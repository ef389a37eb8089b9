// src/handlers/mod.rs

pub mod admin;
pub mod api;
pub mod auth;
pub mod public;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::models::response::SubmissionOutcome;

/// 201 for a new response, 200 for an ignored repeat.
impl IntoResponse for SubmissionOutcome {
    fn into_response(self) -> Response {
        match self {
            SubmissionOutcome::Created {
                response_id,
                answers_recorded,
            } => (
                StatusCode::CREATED,
                Json(json!({
                    "status": "ok",
                    "response_id": response_id,
                    "answers_recorded": answers_recorded,
                })),
            )
                .into_response(),
            SubmissionOutcome::AlreadySubmitted => (
                StatusCode::OK,
                Json(json!({ "status": "already_answered" })),
            )
                .into_response(),
        }
    }
}
