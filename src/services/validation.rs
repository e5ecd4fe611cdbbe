use std::sync::LazyLock;

use regex::Regex;

use crate::models::FieldName;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@]+@[^@]+\.[^@]+").expect("valid email regex"));
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?\d{7,15}$").expect("valid phone regex"));

/// Local format check for an answer. Callers pass the trimmed value.
pub fn validate(field: FieldName, value: &str) -> bool {
    if value.trim().is_empty() {
        return false;
    }
    match field {
        FieldName::Email => EMAIL_RE.is_match(value),
        FieldName::Phone => PHONE_RE.is_match(value),
        _ => true,
    }
}
