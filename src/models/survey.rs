// src/models/survey.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::{not_blank, question::QuestionView};

/// Represents the 'surveys' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Survey {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    /// Only active surveys are listed to respondents and accept submissions.
    pub is_active: bool,
}

/// Admin listing row: a survey plus how many responses it has collected.
#[derive(Debug, Serialize, FromRow)]
pub struct SurveyOverview {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub response_count: i64,
}

/// A survey with its nested questions and options.
#[derive(Debug, Serialize)]
pub struct SurveyDetail {
    #[serde(flatten)]
    pub survey: Survey,
    pub questions: Vec<QuestionView>,
}

/// Catalog entry; `questions` is only present when requested.
#[derive(Debug, Serialize)]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub survey: Survey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<QuestionView>>,
}

/// Respondent landing page data, split by whether the caller already answered.
#[derive(Debug, Serialize)]
pub struct SurveyIndex {
    pub available: Vec<Survey>,
    pub completed: Vec<Survey>,
}

/// Survey definition as shown to a respondent about to fill it in.
#[derive(Debug, Serialize)]
pub struct SurveyForm {
    #[serde(flatten)]
    pub detail: SurveyDetail,
    pub already_answered: bool,
}

/// Query parameters for the catalog listing.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogParams {
    #[serde(default)]
    pub include_questions: bool,
}

/// DTO for creating a survey.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSurveyRequest {
    #[validate(
        length(min = 1, max = 255, message = "Title is required (max 255 characters)."),
        custom(function = not_blank, message = "Title is required (max 255 characters).")
    )]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

/// DTO for updating a survey. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSurveyRequest {
    #[validate(
        length(min = 1, max = 255, message = "Title is required (max 255 characters)."),
        custom(function = not_blank, message = "Title is required (max 255 characters).")
    )]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

fn default_active() -> bool {
    true
}
