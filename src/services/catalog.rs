// src/services/catalog.rs
//
// Read-only access to survey definitions. Functions take a connection so
// they can run inside a caller's transaction as well as on a pooled connection.

use std::collections::{HashMap, HashSet};

use sqlx::PgConnection;

use crate::{
    error::{AppError, survey_not_found},
    models::{
        question::{OptionView, Question, QuestionOption, QuestionView},
        survey::{CatalogEntry, Survey, SurveyDetail, SurveyForm, SurveyIndex},
    },
};

pub async fn find_survey(conn: &mut PgConnection, id: i64) -> Result<Option<Survey>, AppError> {
    let survey = sqlx::query_as::<_, Survey>(
        "SELECT id, title, description, is_active FROM surveys WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(survey)
}

/// Like [`find_survey`], but inactive surveys count as missing.
pub async fn find_active_survey(
    conn: &mut PgConnection,
    id: i64,
) -> Result<Option<Survey>, AppError> {
    let survey = sqlx::query_as::<_, Survey>(
        "SELECT id, title, description, is_active FROM surveys WHERE id = $1 AND is_active",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(survey)
}

pub async fn list_active_surveys(conn: &mut PgConnection) -> Result<Vec<Survey>, AppError> {
    let surveys = sqlx::query_as::<_, Survey>(
        "SELECT id, title, description, is_active FROM surveys WHERE is_active ORDER BY id",
    )
    .fetch_all(conn)
    .await?;

    Ok(surveys)
}

/// Questions of a survey, ordered by id.
pub async fn load_questions(
    conn: &mut PgConnection,
    survey_id: i64,
) -> Result<Vec<Question>, AppError> {
    let questions = sqlx::query_as::<_, Question>(
        "SELECT id, survey_id, text, type FROM questions WHERE survey_id = $1 ORDER BY id",
    )
    .bind(survey_id)
    .fetch_all(conn)
    .await?;

    Ok(questions)
}

/// Every option of every question in a survey, ordered by id.
pub async fn load_options(
    conn: &mut PgConnection,
    survey_id: i64,
) -> Result<Vec<QuestionOption>, AppError> {
    let options = sqlx::query_as::<_, QuestionOption>(
        r#"
        SELECT o.id, o.question_id, o.text
        FROM options o
        JOIN questions q ON q.id = o.question_id
        WHERE q.survey_id = $1
        ORDER BY o.id
        "#,
    )
    .bind(survey_id)
    .fetch_all(conn)
    .await?;

    Ok(options)
}

/// Nests options under their questions. Options are only listed for choice questions.
pub fn assemble_questions(questions: Vec<Question>, options: Vec<QuestionOption>) -> Vec<QuestionView> {
    let mut by_question: HashMap<i64, Vec<OptionView>> = HashMap::new();
    for option in options {
        by_question.entry(option.question_id).or_default().push(OptionView {
            id: option.id,
            text: option.text,
        });
    }

    questions
        .into_iter()
        .map(|q| QuestionView {
            options: if q.question_type.is_choice() {
                by_question.remove(&q.id).unwrap_or_default()
            } else {
                Vec::new()
            },
            id: q.id,
            text: q.text,
            question_type: q.question_type,
        })
        .collect()
}

pub async fn load_detail(conn: &mut PgConnection, survey: Survey) -> Result<SurveyDetail, AppError> {
    let questions = load_questions(conn, survey.id).await?;
    let options = load_options(conn, survey.id).await?;

    Ok(SurveyDetail {
        survey,
        questions: assemble_questions(questions, options),
    })
}

/// An active survey with its questions and options, or `NotFound`.
pub async fn active_survey_detail(conn: &mut PgConnection, id: i64) -> Result<SurveyDetail, AppError> {
    let survey = find_active_survey(conn, id)
        .await?
        .ok_or_else(survey_not_found)?;

    load_detail(conn, survey).await
}

/// Active surveys, optionally with nested definitions.
pub async fn catalog(
    conn: &mut PgConnection,
    include_questions: bool,
) -> Result<Vec<CatalogEntry>, AppError> {
    let surveys = list_active_surveys(conn).await?;

    let mut entries = Vec::with_capacity(surveys.len());
    for survey in surveys {
        let entry = if include_questions {
            let detail = load_detail(conn, survey).await?;
            CatalogEntry {
                survey: detail.survey,
                questions: Some(detail.questions),
            }
        } else {
            CatalogEntry {
                survey,
                questions: None,
            }
        };
        entries.push(entry);
    }

    Ok(entries)
}

pub async fn has_responded(
    conn: &mut PgConnection,
    survey_id: i64,
    address: &str,
) -> Result<bool, AppError> {
    let found = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM responses WHERE survey_id = $1 AND ip_address = $2 LIMIT 1",
    )
    .bind(survey_id)
    .bind(address)
    .fetch_optional(conn)
    .await?;

    Ok(found.is_some())
}

/// Active surveys split by whether `address` has already answered them.
pub async fn survey_index(conn: &mut PgConnection, address: &str) -> Result<SurveyIndex, AppError> {
    let surveys = list_active_surveys(&mut *conn).await?;

    let answered: HashSet<i64> = sqlx::query_scalar::<_, i64>(
        "SELECT DISTINCT survey_id FROM responses WHERE ip_address = $1",
    )
    .bind(address)
    .fetch_all(conn)
    .await?
    .into_iter()
    .collect();

    let (completed, available): (Vec<Survey>, Vec<Survey>) = surveys
        .into_iter()
        .partition(|s| answered.contains(&s.id));

    Ok(SurveyIndex {
        available,
        completed,
    })
}

/// The fill-in view of an active survey for one respondent address.
pub async fn survey_form(
    conn: &mut PgConnection,
    id: i64,
    address: &str,
) -> Result<SurveyForm, AppError> {
    let detail = active_survey_detail(&mut *conn, id).await?;
    let already_answered = has_responded(conn, id, address).await?;

    Ok(SurveyForm {
        detail,
        already_answered,
    })
}
