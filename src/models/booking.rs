use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{AnswerSet, FieldName};

/// The record handed to the persistence sink once a conversation completes.
#[derive(Debug, Clone, Serialize)]
pub struct BookingRecord {
    pub id: String,
    pub session_id: String,
    pub raw_input: AnswerSet,
    pub llm_summary: String,
    pub alert_flag: bool,
    pub extra_fields: serde_json::Map<String, serde_json::Value>,
    pub created_at: NaiveDateTime,
}

/// A booking as read back from the queryable store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredAppointment {
    pub id: String,
    pub session_id: String,
    pub raw_input: serde_json::Value,
    pub llm_summary: String,
    pub alert_flag: bool,
    pub extra_fields: serde_json::Value,
    pub created_at: String,
}

/// What the language model produced when asked to confirm a booking.
#[derive(Debug, Clone, PartialEq)]
pub enum BookingExtraction {
    Structured(HashMap<FieldName, String>),
    FreeText(String),
}

impl BookingExtraction {
    pub fn kind(&self) -> &'static str {
        match self {
            BookingExtraction::Structured(_) => "structured",
            BookingExtraction::FreeText(_) => "free_text",
        }
    }

    /// Confirmation text shown to the user; may still contain placeholders.
    pub fn into_message(self) -> String {
        match self {
            BookingExtraction::Structured(fields) => {
                let get = |f: FieldName| fields.get(&f).map(String::as_str).unwrap_or_default();
                format!(
                    "Appointment booked for {} at {}.\nWe've noted your symptoms: {}.\nA confirmation will be sent to {}.",
                    get(FieldName::Name),
                    get(FieldName::Address),
                    get(FieldName::Symptoms),
                    get(FieldName::Email),
                )
            }
            BookingExtraction::FreeText(text) => text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_message() {
        let fields = HashMap::from([
            (FieldName::Name, "Alice".to_string()),
            (FieldName::Email, "alice@x.com".to_string()),
            (FieldName::Phone, "+15551234567".to_string()),
            (FieldName::Address, "221B Baker St".to_string()),
            (FieldName::Symptoms, "cough".to_string()),
        ]);
        let msg = BookingExtraction::Structured(fields).into_message();
        assert!(msg.starts_with("Appointment booked for Alice at 221B Baker St."));
        assert!(msg.contains("symptoms: cough"));
        assert!(msg.ends_with("sent to alice@x.com."));
    }

    #[test]
    fn test_free_text_passes_through() {
        let extraction = BookingExtraction::FreeText("Booked!".to_string());
        assert_eq!(extraction.kind(), "free_text");
        assert_eq!(extraction.into_message(), "Booked!");
    }
}
