// src/handlers/api.rs
//
// Token-gated JSON API for external clients.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use sqlx::PgPool;

use crate::{
    error::{AppError, survey_not_found},
    models::{
        response::{Identity, SubmitResponseRequest},
        survey::CatalogParams,
    },
    services::{aggregation, catalog, submission},
    state::AppState,
    utils::identity::ClientAddress,
};

/// Lists active surveys; `?include_questions=true` nests their definitions.
pub async fn list_surveys(
    State(pool): State<PgPool>,
    Query(params): Query<CatalogParams>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let entries = catalog::catalog(&mut conn, params.include_questions).await?;

    Ok(Json(entries))
}

/// An active survey with its questions and options.
pub async fn get_survey(
    State(pool): State<PgPool>,
    Path(survey_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let detail = catalog::active_survey_detail(&mut conn, survey_id).await?;

    Ok(Json(detail))
}

/// Records a response.
///
/// The survey must exist and be active before the body is looked at, so an
/// unknown survey is a 404 whatever the payload.
pub async fn submit_response(
    State(state): State<AppState>,
    Path(survey_id): Path<i64>,
    ClientAddress(address): ClientAddress,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    {
        let mut conn = state.pool.acquire().await?;
        catalog::find_active_survey(&mut conn, survey_id)
            .await?
            .ok_or_else(survey_not_found)?;
    }

    let request = SubmitResponseRequest::from_json(&body)?;
    let identity = Identity::new(address, request.client_token);

    let outcome = submission::submit(
        &state.pool,
        survey_id,
        &identity,
        &request.entries,
        state.dedup_policy(),
    )
    .await?;

    Ok(outcome)
}

/// Statistics for any existing survey, active or not.
pub async fn survey_results(
    State(pool): State<PgPool>,
    Path(survey_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let stats = aggregation::aggregate(&pool, survey_id).await?;

    Ok(Json(stats))
}
