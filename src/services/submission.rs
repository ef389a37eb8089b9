// src/services/submission.rs

use std::collections::{HashMap, HashSet};

use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use crate::{
    error::{AppError, survey_not_found},
    models::{
        question::{Question, QuestionOption, QuestionType},
        response::{AnswerEntry, AnswerValue, Identity, NewAnswer, SubmissionOutcome},
    },
    services::catalog,
};

/// Whether a second response from the same identity is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupPolicy {
    Enforce,
    Disabled,
}

impl DedupPolicy {
    pub fn from_allow_multiple(allow_multiple_responses: bool) -> Self {
        if allow_multiple_responses {
            DedupPolicy::Disabled
        } else {
            DedupPolicy::Enforce
        }
    }
}

/// What the engine needs to know about a survey to validate answers.
#[derive(Debug, Default)]
pub struct SurveyDefinition {
    question_types: HashMap<i64, QuestionType>,
    /// option id -> owning question id
    option_owner: HashMap<i64, i64>,
}

impl SurveyDefinition {
    pub fn new(questions: &[Question], options: &[QuestionOption]) -> Self {
        Self {
            question_types: questions.iter().map(|q| (q.id, q.question_type)).collect(),
            option_owner: options.iter().map(|o| (o.id, o.question_id)).collect(),
        }
    }

    pub async fn load(conn: &mut PgConnection, survey_id: i64) -> Result<Self, AppError> {
        let questions = catalog::load_questions(conn, survey_id).await?;
        let options = catalog::load_options(conn, survey_id).await?;
        Ok(Self::new(&questions, &options))
    }

    fn owns(&self, question_id: i64, option_id: i64) -> bool {
        self.option_owner.get(&option_id) == Some(&question_id)
    }
}

fn single_option(value: &AnswerValue) -> Option<i64> {
    match value {
        AnswerValue::Option(id) => Some(*id),
        AnswerValue::Options(ids) if ids.len() == 1 => Some(ids[0]),
        AnswerValue::Options(_) => None,
        AnswerValue::Text(raw) => raw.trim().parse().ok(),
    }
}

fn option_ids(value: &AnswerValue) -> Vec<i64> {
    match value {
        AnswerValue::Option(id) => vec![*id],
        AnswerValue::Options(ids) => ids.clone(),
        AnswerValue::Text(raw) => raw.trim().parse().into_iter().collect(),
    }
}

fn free_text(value: &AnswerValue) -> Option<&str> {
    match value {
        AnswerValue::Text(raw) => Some(raw.trim()).filter(|t| !t.is_empty()),
        AnswerValue::Option(_) | AnswerValue::Options(_) => None,
    }
}

fn rating(value: &AnswerValue) -> Option<u8> {
    free_text(value)?
        .parse::<u8>()
        .ok()
        .filter(|r| (1..=5).contains(r))
}

/// Turns payload entries into the answer rows to insert.
///
/// Anything that does not fit the survey is dropped: unknown questions,
/// options of another question, blank text, values of the wrong shape.
/// Single-valued questions keep their first usable entry; multiple-choice
/// questions keep each distinct valid option once.
pub fn plan_answers(definition: &SurveyDefinition, entries: &[AnswerEntry]) -> Vec<NewAnswer> {
    let mut answered: HashSet<i64> = HashSet::new();
    let mut picked: HashSet<(i64, i64)> = HashSet::new();
    let mut rows = Vec::new();

    for entry in entries {
        let question_id = entry.question_id;
        let Some(&question_type) = definition.question_types.get(&question_id) else {
            continue;
        };

        match question_type {
            QuestionType::SingleChoice => {
                if answered.contains(&question_id) {
                    continue;
                }
                if let Some(option_id) = single_option(&entry.value)
                    .filter(|&o| definition.owns(question_id, o))
                {
                    answered.insert(question_id);
                    rows.push(NewAnswer::choice(question_id, option_id));
                }
            }
            QuestionType::MultipleChoice => {
                for option_id in option_ids(&entry.value) {
                    if definition.owns(question_id, option_id)
                        && picked.insert((question_id, option_id))
                    {
                        rows.push(NewAnswer::choice(question_id, option_id));
                    }
                }
            }
            QuestionType::Text
            | QuestionType::LongText
            | QuestionType::Number
            | QuestionType::Range
            | QuestionType::Date => {
                if answered.contains(&question_id) {
                    continue;
                }
                if let Some(text) = free_text(&entry.value) {
                    answered.insert(question_id);
                    rows.push(NewAnswer::text(question_id, text));
                }
            }
            QuestionType::Rating => {
                if answered.contains(&question_id) {
                    continue;
                }
                if let Some(score) = rating(&entry.value) {
                    answered.insert(question_id);
                    rows.push(NewAnswer::text(question_id, score.to_string()));
                }
            }
        }
    }

    rows
}

/// Records one respondent's answers to a survey.
///
/// The response row and its answers are written in one transaction. When
/// deduplication is enforced, an earlier response from the same address, or
/// from the same client token, turns the call into a no-op that reports
/// [`SubmissionOutcome::AlreadySubmitted`]. The unique indexes on the dedup
/// columns settle concurrent submissions the lookup cannot see.
pub async fn submit(
    pool: &PgPool,
    survey_id: i64,
    identity: &Identity,
    entries: &[AnswerEntry],
    policy: DedupPolicy,
) -> Result<SubmissionOutcome, AppError> {
    let mut tx = pool.begin().await?;

    catalog::find_active_survey(&mut tx, survey_id)
        .await?
        .ok_or_else(survey_not_found)?;

    if policy == DedupPolicy::Enforce && previous_response(&mut tx, survey_id, identity).await? {
        tracing::info!(survey_id, "Duplicate submission ignored");
        return Ok(SubmissionOutcome::AlreadySubmitted);
    }

    let definition = SurveyDefinition::load(&mut tx, survey_id).await?;
    let answers = plan_answers(&definition, entries);

    let (dedup_address, dedup_token) = match policy {
        DedupPolicy::Enforce => (Some(identity.address.as_str()), identity.client_token.as_deref()),
        DedupPolicy::Disabled => (None, None),
    };

    let response_id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO responses (survey_id, ip_address, client_token, dedup_address, dedup_token)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT DO NOTHING
        RETURNING id
        "#,
    )
    .bind(survey_id)
    .bind(&identity.address)
    .bind(identity.client_token.as_deref())
    .bind(dedup_address)
    .bind(dedup_token)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(response_id) = response_id else {
        // A concurrent submission from the same identity committed first.
        tx.rollback().await?;
        tracing::info!(survey_id, "Concurrent duplicate submission ignored");
        return Ok(SubmissionOutcome::AlreadySubmitted);
    };

    if !answers.is_empty() {
        let mut query_builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO answers (response_id, question_id, option_id, text_answer) ",
        );
        query_builder.push_values(&answers, |mut row, answer| {
            row.push_bind(response_id)
                .push_bind(answer.question_id)
                .push_bind(answer.option_id)
                .push_bind(answer.text_answer.clone());
        });
        query_builder.build().execute(&mut *tx).await?;
    }

    tx.commit().await?;

    tracing::info!(
        survey_id,
        response_id,
        answers = answers.len(),
        dropped = entries.len().saturating_sub(answers.len()),
        "Response recorded"
    );

    Ok(SubmissionOutcome::Created {
        response_id,
        answers_recorded: answers.len(),
    })
}

async fn previous_response(
    conn: &mut PgConnection,
    survey_id: i64,
    identity: &Identity,
) -> Result<bool, AppError> {
    let existing = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT id FROM responses
        WHERE survey_id = $1
          AND (ip_address = $2 OR ($3::TEXT IS NOT NULL AND client_token = $3))
        LIMIT 1
        "#,
    )
    .bind(survey_id)
    .bind(&identity.address)
    .bind(identity.client_token.as_deref())
    .fetch_optional(conn)
    .await?;

    Ok(existing.is_some())
}
