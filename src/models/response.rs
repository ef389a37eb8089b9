// src/models/response.rs

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::AppError;

/// Maximum stored length of a client token (matches `responses.client_token`).
pub const MAX_CLIENT_TOKEN_LEN: usize = 128;

/// Who is submitting: the network address plus an optional opaque client token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub address: String,
    pub client_token: Option<String>,
}

impl Identity {
    pub fn new(address: impl Into<String>, client_token: Option<String>) -> Self {
        Self {
            address: address.into(),
            client_token,
        }
    }
}

/// The value a respondent gave for one question, before it is checked
/// against the question's type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerValue {
    /// A single option id.
    Option(i64),
    /// Several option ids (multiple choice).
    Options(Vec<i64>),
    /// Free text. Choice questions also accept a numeric string here,
    /// which is how HTML forms carry option ids.
    Text(String),
}

/// One payload entry: a question reference and its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerEntry {
    pub question_id: i64,
    pub value: AnswerValue,
}

/// An answer row about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAnswer {
    pub question_id: i64,
    pub option_id: Option<i64>,
    pub text_answer: Option<String>,
}

impl NewAnswer {
    pub fn choice(question_id: i64, option_id: i64) -> Self {
        Self {
            question_id,
            option_id: Some(option_id),
            text_answer: None,
        }
    }

    pub fn text(question_id: i64, text: impl Into<String>) -> Self {
        Self {
            question_id,
            option_id: None,
            text_answer: Some(text.into()),
        }
    }
}

/// A parsed JSON submission body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitResponseRequest {
    pub client_token: Option<String>,
    pub entries: Vec<AnswerEntry>,
}

impl SubmitResponseRequest {
    /// Parses the API submission body.
    ///
    /// The body must be a non-empty object with a non-empty `answers` list.
    /// Individual items that cannot be understood are skipped, not rejected.
    pub fn from_json(body: &[u8]) -> Result<Self, AppError> {
        let invalid_json = || AppError::BadRequest("invalid_json".to_string());
        let data: Value = serde_json::from_slice(body).map_err(|_| invalid_json())?;
        let object = data
            .as_object()
            .filter(|object| !object.is_empty())
            .ok_or_else(invalid_json)?;

        let items = match object.get("answers") {
            Some(Value::Array(items)) if !items.is_empty() => items,
            _ => return Err(AppError::BadRequest("answers_required".to_string())),
        };

        let raw_token = match object.get("client_token") {
            None | Some(Value::Null) => None,
            Some(Value::String(token)) => Some(token.as_str()),
            Some(_) => {
                return Err(AppError::BadRequest(
                    "client_token must be a string".to_string(),
                ));
            }
        };
        let client_token = normalize_client_token(raw_token)?;
        let entries = items.iter().filter_map(parse_entry).collect();

        Ok(Self {
            client_token,
            entries,
        })
    }
}

/// Trims the token; blank means absent. Over-long tokens are refused.
pub fn normalize_client_token(raw: Option<&str>) -> Result<Option<String>, AppError> {
    let Some(token) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    if token.chars().count() > MAX_CLIENT_TOKEN_LEN {
        return Err(AppError::BadRequest(format!(
            "client_token must be at most {MAX_CLIENT_TOKEN_LEN} characters"
        )));
    }
    Ok(Some(token.to_string()))
}

/// Accepts integers and numeric strings, like a form field would carry them.
fn as_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_entry(item: &Value) -> Option<AnswerEntry> {
    let question_id = as_id(item.get("question_id")?)?;

    let value = if let Some(ids) = item.get("option_ids").and_then(Value::as_array) {
        AnswerValue::Options(ids.iter().filter_map(as_id).collect())
    } else if let Some(raw) = item.get("option_id").filter(|v| !v.is_null()) {
        AnswerValue::Option(as_id(raw)?)
    } else {
        AnswerValue::Text(item.get("text_answer")?.as_str()?.to_string())
    };

    Some(AnswerEntry { question_id, value })
}

/// Parses an `application/x-www-form-urlencoded` survey form.
///
/// `question_{id}` carries a single option id or text; repeated
/// `question_{id}_multi` fields carry the ticked option ids.
pub fn entries_from_form(body: &[u8]) -> Vec<AnswerEntry> {
    let mut singles: BTreeMap<i64, String> = BTreeMap::new();
    let mut multis: BTreeMap<i64, Vec<i64>> = BTreeMap::new();

    for (key, value) in url::form_urlencoded::parse(body) {
        let Some(rest) = key.strip_prefix("question_") else {
            continue;
        };
        if let Some(id) = rest.strip_suffix("_multi") {
            let (Ok(question_id), Ok(option_id)) = (id.parse::<i64>(), value.trim().parse::<i64>()) else {
                continue;
            };
            multis.entry(question_id).or_default().push(option_id);
        } else if let Ok(question_id) = rest.parse::<i64>() {
            singles.entry(question_id).or_insert_with(|| value.into_owned());
        }
    }

    singles
        .into_iter()
        .map(|(question_id, text)| AnswerEntry {
            question_id,
            value: AnswerValue::Text(text),
        })
        .chain(multis.into_iter().map(|(question_id, ids)| AnswerEntry {
            question_id,
            value: AnswerValue::Options(ids),
        }))
        .collect()
}

/// Result of a submission attempt. Neither variant is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Created { response_id: i64, answers_recorded: usize },
    /// The identity already has a response for this survey; nothing was written.
    AlreadySubmitted,
}
