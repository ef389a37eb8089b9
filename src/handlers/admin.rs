// src/handlers/admin.rs
//
// Admin-only CRUD over surveys, questions and options. Deleting a parent
// removes its children through the foreign-key cascades.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::{AppError, survey_not_found},
    models::{
        question::{
            CreateQuestionRequest, OptionRequest, Question, QuestionOption, UpdateQuestionRequest,
            parse_question_type,
        },
        survey::{CreateSurveyRequest, Survey, SurveyOverview, UpdateSurveyRequest},
    },
    services::{aggregation, catalog},
    utils::{html::clean_description, jwt::Claims},
};

fn question_not_found() -> AppError {
    AppError::NotFound("Question not found".to_string())
}

fn option_not_found() -> AppError {
    AppError::NotFound("Option not found".to_string())
}

/// Lists every survey with its response count.
pub async fn list_surveys(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let surveys = sqlx::query_as::<_, SurveyOverview>(
        r#"
        SELECT
            s.id, s.title, s.description, s.is_active, s.created_at,
            COUNT(r.id) AS response_count
        FROM surveys s
        LEFT JOIN responses r ON r.survey_id = s.id
        GROUP BY s.id
        ORDER BY s.id DESC
        "#,
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list surveys: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(surveys))
}

pub async fn create_survey(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateSurveyRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let survey = sqlx::query_as::<_, Survey>(
        r#"
        INSERT INTO surveys (title, description, is_active)
        VALUES ($1, $2, $3)
        RETURNING id, title, description, is_active
        "#,
    )
    .bind(payload.title.trim())
    .bind(clean_description(payload.description.as_deref()))
    .bind(payload.is_active)
    .fetch_one(&pool)
    .await?;

    tracing::info!(survey_id = survey.id, admin = %claims.sub, "Survey created");
    Ok((StatusCode::CREATED, Json(survey)))
}

/// A survey with its full definition, active or not.
pub async fn get_survey(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let survey = catalog::find_survey(&mut conn, id)
        .await?
        .ok_or_else(survey_not_found)?;
    let detail = catalog::load_detail(&mut conn, survey).await?;

    Ok(Json(detail))
}

/// Updates survey fields that are present in the payload.
pub async fn update_survey(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateSurveyRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let survey = sqlx::query_as::<_, Survey>(
        r#"
        UPDATE surveys SET
            title = COALESCE($2, title),
            description = CASE WHEN $3 THEN $4 ELSE description END,
            is_active = COALESCE($5, is_active)
        WHERE id = $1
        RETURNING id, title, description, is_active
        "#,
    )
    .bind(id)
    .bind(payload.title.as_deref().map(str::trim))
    .bind(payload.description.is_some())
    .bind(clean_description(payload.description.as_deref()))
    .bind(payload.is_active)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(survey_not_found)?;

    Ok(Json(survey))
}

/// Deletes a survey together with its questions, options, responses and answers.
pub async fn delete_survey(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM surveys WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete survey: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(survey_not_found());
    }

    tracing::info!(survey_id = id, admin = %claims.sub, "Survey deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Questions of a survey with their options.
pub async fn list_questions(
    State(pool): State<PgPool>,
    Path(survey_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let survey = catalog::find_survey(&mut conn, survey_id)
        .await?
        .ok_or_else(survey_not_found)?;
    let detail = catalog::load_detail(&mut conn, survey).await?;

    Ok(Json(detail.questions))
}

pub async fn create_question(
    State(pool): State<PgPool>,
    Path(survey_id): Path<i64>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let question_type = parse_question_type(payload.question_type.as_deref())?;

    let mut conn = pool.acquire().await?;
    catalog::find_survey(&mut conn, survey_id)
        .await?
        .ok_or_else(survey_not_found)?;

    let question = sqlx::query_as::<_, Question>(
        r#"
        INSERT INTO questions (survey_id, text, type)
        VALUES ($1, $2, $3)
        RETURNING id, survey_id, text, type
        "#,
    )
    .bind(survey_id)
    .bind(payload.text.trim())
    .bind(question_type.as_str())
    .fetch_one(&mut *conn)
    .await?;

    Ok((StatusCode::CREATED, Json(question)))
}

/// Updates a question's text and, while it has no answers yet, its type.
///
/// Once answers exist the type is frozen: stored answers were validated
/// against the old type and there is no migration path for them.
pub async fn update_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let new_type = payload
        .question_type
        .as_deref()
        .map(|raw| parse_question_type(Some(raw)))
        .transpose()?;

    let mut tx = pool.begin().await?;

    let current = sqlx::query_as::<_, Question>(
        "SELECT id, survey_id, text, type FROM questions WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(question_not_found)?;

    if let Some(new_type) = new_type.filter(|t| *t != current.question_type) {
        let answered = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM answers WHERE question_id = $1 LIMIT 1",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .is_some();

        if answered {
            return Err(AppError::Conflict(format!(
                "Question already has answers; its type cannot change from {} to {}",
                current.question_type, new_type
            )));
        }
    }

    let question = sqlx::query_as::<_, Question>(
        r#"
        UPDATE questions SET
            text = COALESCE($2, text),
            type = COALESCE($3, type)
        WHERE id = $1
        RETURNING id, survey_id, text, type
        "#,
    )
    .bind(id)
    .bind(payload.text.as_deref().map(str::trim))
    .bind(new_type.map(|t| t.as_str()))
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Json(question))
}

/// Deletes a question with its options and answers.
pub async fn delete_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM questions WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(question_not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_option(
    State(pool): State<PgPool>,
    Path(question_id): Path<i64>,
    Json(payload): Json<OptionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let question = sqlx::query_as::<_, Question>(
        "SELECT id, survey_id, text, type FROM questions WHERE id = $1",
    )
    .bind(question_id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(question_not_found)?;

    if !question.question_type.is_choice() {
        return Err(AppError::BadRequest(format!(
            "Options can only be added to choice questions, not {}",
            question.question_type
        )));
    }

    let option = sqlx::query_as::<_, QuestionOption>(
        r#"
        INSERT INTO options (question_id, text)
        VALUES ($1, $2)
        RETURNING id, question_id, text
        "#,
    )
    .bind(question_id)
    .bind(payload.text.trim())
    .fetch_one(&pool)
    .await?;

    Ok((StatusCode::CREATED, Json(option)))
}

pub async fn update_option(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<OptionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let option = sqlx::query_as::<_, QuestionOption>(
        "UPDATE options SET text = $2 WHERE id = $1 RETURNING id, question_id, text",
    )
    .bind(id)
    .bind(payload.text.trim())
    .fetch_optional(&pool)
    .await?
    .ok_or_else(option_not_found)?;

    Ok(Json(option))
}

/// Deletes an option and every answer that picked it.
pub async fn delete_option(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM options WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(option_not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn survey_results(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let stats = aggregation::aggregate(&pool, id).await?;

    Ok(Json(stats))
}

/// Who is logged in.
pub async fn whoami(Extension(claims): Extension<Claims>) -> impl IntoResponse {
    Json(json!({ "username": claims.sub, "role": claims.role }))
}
