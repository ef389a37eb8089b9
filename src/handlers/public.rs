// src/handlers/public.rs
//
// Respondent-facing routes. Identity is the caller's address only, the way
// an HTML form submission identifies itself.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::response::{Identity, entries_from_form},
    services::{catalog, submission},
    state::AppState,
    utils::identity::ClientAddress,
};

/// Lists active surveys, split into those the caller can still answer and
/// those already answered from this address.
pub async fn index(
    State(pool): State<PgPool>,
    ClientAddress(address): ClientAddress,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let index = catalog::survey_index(&mut conn, &address).await?;

    Ok(Json(index))
}

/// Returns an active survey ready to be filled in.
pub async fn show_survey(
    State(pool): State<PgPool>,
    Path(survey_id): Path<i64>,
    ClientAddress(address): ClientAddress,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let form = catalog::survey_form(&mut conn, survey_id, &address).await?;

    Ok(Json(form))
}

/// Accepts a url-encoded survey form.
pub async fn submit_form(
    State(state): State<AppState>,
    Path(survey_id): Path<i64>,
    ClientAddress(address): ClientAddress,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let entries = entries_from_form(&body);
    let identity = Identity::new(address, None);

    let outcome = submission::submit(
        &state.pool,
        survey_id,
        &identity,
        &entries,
        state.dedup_policy(),
    )
    .await?;

    Ok(outcome)
}
