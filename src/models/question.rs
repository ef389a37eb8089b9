// src/models/question.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

use crate::models::not_blank;

/// The answer type of a question.
///
/// Stored in the `questions.type` column under its canonical name
/// (see [`QuestionType::as_str`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    Text,
    #[serde(alias = "text_long")]
    LongText,
    Number,
    Range,
    Date,
    #[serde(rename = "rating_1_5")]
    Rating,
}

/// How the aggregation engine summarises answers of a question type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatisticsKind {
    /// Per-option counts, including options nobody picked.
    Choices,
    /// Counts per distinct free-text value.
    GroupedValues,
    /// The raw answers, unaggregated.
    TextList,
}

impl QuestionType {
    pub const ALL: [QuestionType; 8] = [
        QuestionType::SingleChoice,
        QuestionType::MultipleChoice,
        QuestionType::Text,
        QuestionType::LongText,
        QuestionType::Number,
        QuestionType::Range,
        QuestionType::Date,
        QuestionType::Rating,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "single_choice",
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::Text => "text",
            QuestionType::LongText => "long_text",
            QuestionType::Number => "number",
            QuestionType::Range => "range",
            QuestionType::Date => "date",
            QuestionType::Rating => "rating_1_5",
        }
    }

    /// Choice questions own options; all other types take free text.
    pub fn is_choice(self) -> bool {
        matches!(self, QuestionType::SingleChoice | QuestionType::MultipleChoice)
    }

    pub fn statistics_kind(self) -> StatisticsKind {
        match self {
            QuestionType::SingleChoice | QuestionType::MultipleChoice => StatisticsKind::Choices,
            QuestionType::Text | QuestionType::Number | QuestionType::Range | QuestionType::Date => {
                StatisticsKind::GroupedValues
            }
            QuestionType::LongText | QuestionType::Rating => StatisticsKind::TextList,
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownQuestionType(pub String);

impl fmt::Display for UnknownQuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown question type '{}'", self.0)
    }
}

impl std::error::Error for UnknownQuestionType {}

impl FromStr for QuestionType {
    type Err = UnknownQuestionType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "single_choice" => Ok(QuestionType::SingleChoice),
            "multiple_choice" => Ok(QuestionType::MultipleChoice),
            "text" => Ok(QuestionType::Text),
            "long_text" | "text_long" => Ok(QuestionType::LongText),
            "number" => Ok(QuestionType::Number),
            "range" => Ok(QuestionType::Range),
            "date" => Ok(QuestionType::Date),
            "rating_1_5" => Ok(QuestionType::Rating),
            other => Err(UnknownQuestionType(other.to_string())),
        }
    }
}

impl TryFrom<String> for QuestionType {
    type Error = UnknownQuestionType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Question {
    pub id: i64,
    pub survey_id: i64,
    pub text: String,

    /// Mapped from the database column 'type' since `type` is a reserved keyword in Rust.
    #[sqlx(rename = "type", try_from = "String")]
    #[serde(rename = "type")]
    pub question_type: QuestionType,
}

/// Represents the 'options' table. Named `QuestionOption` to stay clear of `std::option::Option`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuestionOption {
    pub id: i64,
    pub question_id: i64,
    pub text: String,
}

/// Public view of an option inside a survey definition.
#[derive(Debug, Clone, Serialize)]
pub struct OptionView {
    pub id: i64,
    pub text: String,
}

/// A question together with its options, as shown to respondents.
/// `options` is empty for non-choice questions.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub id: i64,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub options: Vec<OptionView>,
}

/// DTO for creating a question.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(
        length(min = 1, max = 500, message = "Question text is required (max 500 characters)."),
        custom(function = not_blank, message = "Question text is required (max 500 characters).")
    )]
    pub text: String,
    /// Defaults to `single_choice` when omitted.
    #[serde(rename = "type", default)]
    pub question_type: Option<String>,
}

/// DTO for updating a question. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[validate(
        length(min = 1, max = 500, message = "Question text is required (max 500 characters)."),
        custom(function = not_blank, message = "Question text is required (max 500 characters).")
    )]
    pub text: Option<String>,
    #[serde(rename = "type")]
    pub question_type: Option<String>,
}

/// DTO for creating or renaming an option.
#[derive(Debug, Deserialize, Validate)]
pub struct OptionRequest {
    #[validate(
        length(min = 1, max = 255, message = "Option text is required (max 255 characters)."),
        custom(function = not_blank, message = "Option text is required (max 255 characters).")
    )]
    pub text: String,
}

/// Resolves an optional type string from an admin form, defaulting to single choice.
pub fn parse_question_type(raw: Option<&str>) -> Result<QuestionType, UnknownQuestionType> {
    match raw {
        None => Ok(QuestionType::SingleChoice),
        Some(s) if s.trim().is_empty() => Ok(QuestionType::SingleChoice),
        Some(s) => s.parse(),
    }
}
