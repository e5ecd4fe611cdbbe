//! Reversible redaction of PII answers before they reach the language model.
//!
//! Each PII field is replaced by a token of the form
//! `[REDACTED_<FIELD>_<nonce>]`. All tokens from one call share a random nonce
//! and end in `]`, so no token is a prefix or substring of another, and a nonce
//! is only accepted once no raw value contains any of its tokens.

use uuid::Uuid;

use crate::models::{AnswerSet, FieldName};

const TOKEN_PREFIX: &str = "[REDACTED_";

/// Placeholder token to raw value, valid for a single request/response.
#[derive(Debug, Clone, Default)]
pub struct RedactionMapping {
    entries: Vec<(String, String)>,
}

impl RedactionMapping {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup_prefix(&self, text: &str) -> Option<(&str, &str)> {
        self.entries
            .iter()
            .find(|(token, _)| text.starts_with(token.as_str()))
            .map(|(token, value)| (token.as_str(), value.as_str()))
    }
}

#[derive(Debug, Clone)]
pub struct Redacted {
    pub redacted: AnswerSet,
    pub mapping: RedactionMapping,
}

pub fn redact(record: &AnswerSet) -> Redacted {
    loop {
        if let Some(redacted) = redact_with_nonce(record, &new_nonce()) {
            return redacted;
        }
        tracing::debug!("placeholder nonce collided with an answer, drawing another");
    }
}

/// Redacts with a caller-chosen nonce. Returns `None` when any answer already
/// contains one of the tokens the nonce would produce.
pub fn redact_with_nonce(record: &AnswerSet, nonce: &str) -> Option<Redacted> {
    let tokens: Vec<(FieldName, String)> = record
        .iter()
        .filter(|(field, _)| field.is_pii())
        .map(|(field, _)| (field, placeholder(field, nonce)))
        .collect();

    let collides = record
        .iter()
        .any(|(_, value)| tokens.iter().any(|(_, token)| value.contains(token.as_str())));
    if collides {
        return None;
    }

    let mut redacted = AnswerSet::new();
    let mut mapping = RedactionMapping::default();
    for (field, value) in record.iter() {
        match tokens.iter().find(|(f, _)| *f == field) {
            Some((_, token)) => {
                redacted.insert(field, token.clone());
                mapping.entries.push((token.clone(), value.to_string()));
            }
            None => redacted.insert(field, value),
        }
    }

    Some(Redacted { redacted, mapping })
}

/// Restores every known placeholder in one left-to-right pass. Restored values
/// are never rescanned; unknown placeholders are left as they are.
pub fn unredact(text: &str, mapping: &RedactionMapping) -> String {
    if mapping.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('[') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match mapping.lookup_prefix(tail) {
            Some((token, value)) => {
                out.push_str(value);
                rest = &tail[token.len()..];
            }
            None => {
                out.push('[');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// True if `text` still carries something shaped like a placeholder.
pub fn has_placeholder(text: &str) -> bool {
    text.contains(TOKEN_PREFIX)
}

fn placeholder(field: FieldName, nonce: &str) -> String {
    format!("{TOKEN_PREFIX}{}_{nonce}]", field.as_str().to_uppercase())
}

fn new_nonce() -> String {
    let mut nonce = Uuid::new_v4().simple().to_string();
    nonce.truncate(8);
    nonce
}
