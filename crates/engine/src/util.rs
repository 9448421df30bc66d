//! Internal helpers for input validation and normalization.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation so every operation enforces the same invariants.

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

use crate::{EngineError, ResultEngine};

/// Trim a required name, rejecting empty values.
pub(crate) fn normalize_required_name(value: &str, field: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::validation(field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

/// Trim optional free text, mapping blank input to `None`.
pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Uniqueness key for category names: accents stripped, lowercase,
/// punctuation and whitespace runs collapsed to one space.
pub(crate) fn normalize_category_key(value: &str) -> ResultEngine<String> {
    let mut out = String::new();
    let mut prev_space = false;
    for ch in value.trim().nfkd() {
        if is_combining_mark(ch) {
            continue;
        }
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            prev_space = false;
        } else if !out.is_empty() && !prev_space {
            out.push(' ');
            prev_space = true;
        }
    }
    let key = out.trim_end().to_string();
    if key.is_empty() {
        return Err(EngineError::validation(
            "category",
            "name must contain letters or digits",
        ));
    }
    Ok(key)
}

/// Key stored next to searchable text and applied to search values, so
/// substring matching never depends on the backend's case folding.
/// Accents are stripped and the result is lowercase.
pub(crate) fn search_key(value: &str) -> String {
    value
        .trim()
        .nfkd()
        .filter(|ch| !is_combining_mark(*ch))
        .flat_map(char::to_lowercase)
        .collect()
}
