// src/models/statistics.rs

use serde::Serialize;
use sqlx::FromRow;

use crate::models::{question::QuestionType, survey::Survey};

/// Read-only statistics for one survey, consumed by whatever renders them.
#[derive(Debug, Clone, Serialize)]
pub struct SurveyStatistics {
    pub survey: Survey,
    pub total_responses: i64,
    /// Ordered by question id.
    pub questions: Vec<QuestionStatistics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionStatistics {
    pub id: i64,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(flatten)]
    pub breakdown: Breakdown,
}

/// The per-question summary, shaped by the question type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Breakdown {
    Choices { options: Vec<OptionStat> },
    Values { values: Vec<ValueStat> },
    TextAnswers { text_answers: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionStat {
    pub id: i64,
    pub text: String,
    pub count: i64,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueStat {
    pub value: String,
    pub count: i64,
    pub percent: f64,
}

/// Row of the option/answer outer join.
#[derive(Debug, Clone, FromRow)]
pub struct OptionCount {
    pub id: i64,
    pub text: String,
    pub count: i64,
}

/// Row of the grouped free-text query.
#[derive(Debug, Clone, FromRow)]
pub struct ValueCount {
    pub value: String,
    pub count: i64,
}
