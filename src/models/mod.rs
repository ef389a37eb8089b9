// src/models/mod.rs

pub mod admin;
pub mod question;
pub mod response;
pub mod statistics;
pub mod survey;

/// Refuses values that are empty once surrounding whitespace is dropped.
/// Handlers store the trimmed text, so `"   "` counts as missing.
fn not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        return Err(validator::ValidationError::new("blank")
            .with_message("must not be blank".into()));
    }
    Ok(())
}
