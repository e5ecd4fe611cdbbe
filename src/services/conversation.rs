use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::errors::TurnError;
use crate::models::{
    BookingRecord, ConversationState, FieldName, Phase, Question, Speaker,
};
use crate::services::ai::assistant::IntakeAssistant;
use crate::services::redaction::{redact, unredact, Redacted};
use crate::services::storage::BookingSink;
use crate::services::validation::validate;

pub const COMPLETION_NOTICE: &str = "All answers collected. Proceeding to book your appointment...";

/// Turn-taking rules for the intake flow. Holds no per-session data: every
/// call receives the session's [`ConversationState`] and only mutates it once
/// the turn is known to succeed.
pub struct ConversationMachine {
    questions: Vec<Question>,
    assistant: Arc<dyn IntakeAssistant>,
    sink: Arc<dyn BookingSink>,
}

impl ConversationMachine {
    pub fn new(
        questions: Vec<Question>,
        assistant: Arc<dyn IntakeAssistant>,
        sink: Arc<dyn BookingSink>,
    ) -> Self {
        Self {
            questions,
            assistant,
            sink,
        }
    }

    pub fn current_question(&self, state: &ConversationState) -> Option<&Question> {
        match state.phase {
            Phase::Asking(index) => self.questions.get(index),
            _ => None,
        }
    }

    /// Shows the pending question unless the user is already looking at an
    /// assistant turn. Returns whether a prompt was appended.
    pub fn ask_pending(&self, state: &mut ConversationState) -> bool {
        if state.last_is_assistant() {
            return false;
        }
        match self.current_question(state) {
            Some(question) => {
                let prompt = question.prompt.clone();
                state.push(Speaker::Assistant, prompt, None);
                true
            }
            None => false,
        }
    }

    pub async fn answer(&self, state: &mut ConversationState, input: &str) -> Result<(), TurnError> {
        let (index, field) = match (state.phase, self.current_question(state)) {
            (Phase::Asking(index), Some(question)) => (index, question.field),
            _ => return Err(TurnError::NotAccepting),
        };
        let value = input.trim();

        if self.is_abusive(field, value).await {
            tracing::warn!(conversation = %state.conversation_id, %field, "input blocked as abusive");
            return Err(TurnError::AbuseRejected);
        }

        if !validate(field, value) {
            return Err(TurnError::ValidationFailed(field));
        }

        let mut answers = state.answers.clone();
        answers.insert(field, value);
        let Redacted { redacted, mapping } = redact(&answers);
        let redacted_value = redacted.get(field).unwrap_or_default();

        let start = Instant::now();
        let ack = match self.assistant.acknowledge(field, redacted_value).await {
            Ok(ack) if !ack.trim().is_empty() => ack,
            Ok(_) => fallback_acknowledgment(field),
            Err(e) => {
                tracing::warn!(error = %e, %field, "acknowledgment failed, using fallback");
                fallback_acknowledgment(field)
            }
        };
        let latency_ms = start.elapsed().as_millis() as u64;
        let ack = unredact(&ack, &mapping);

        let next_index = index + 1;
        let (phase, next) = match self.questions.get(next_index) {
            Some(question) => (Phase::Asking(next_index), question.prompt.clone()),
            None => (Phase::AwaitingConsent, COMPLETION_NOTICE.to_string()),
        };

        // No await past this point: the turn is committed in one step.
        state.answers = answers;
        state.push(Speaker::User, value, None);
        state.push(Speaker::Assistant, format!("{ack}\n\n{next}"), Some(latency_ms));
        state.phase = phase;
        state.touch();

        tracing::info!(
            conversation = %state.conversation_id,
            %field,
            answered = state.current_index(),
            latency_ms,
            "answer accepted"
        );
        Ok(())
    }

    /// Consent gate and booking. The sink is called at most once per
    /// conversation lifetime; once completed, further calls are no-ops.
    pub async fn submit(
        &self,
        state: &mut ConversationState,
        session_id: &str,
        consent: bool,
    ) -> Result<(), TurnError> {
        match state.phase {
            Phase::Completed => return Ok(()),
            Phase::AwaitingConsent | Phase::Submitting => {}
            Phase::Asking(_) => return Err(TurnError::NotAccepting),
        }

        if state.submitted {
            state.phase = Phase::Completed;
            return Ok(());
        }

        if !consent {
            return Err(TurnError::ConsentRequired);
        }

        state.phase = Phase::Submitting;
        match self.book(state, session_id).await {
            Ok((summary, latency_ms)) => {
                state.push(Speaker::Assistant, summary, Some(latency_ms));
                state.submitted = true;
                state.phase = Phase::Completed;
                state.touch();
                tracing::info!(conversation = %state.conversation_id, session = session_id, "appointment booked");
                Ok(())
            }
            Err(e) => {
                state.phase = Phase::AwaitingConsent;
                tracing::error!(conversation = %state.conversation_id, error = %e, "booking failed");
                Err(e)
            }
        }
    }

    pub fn reset(&self, state: &mut ConversationState) {
        state.reset();
        self.ask_pending(state);
    }

    /// Shown once the booking is stored; never appended to the transcript.
    pub fn completion_notice(&self, state: &ConversationState) -> Option<String> {
        if !state.is_completed() {
            return None;
        }
        let name = state.answers.get(FieldName::Name).unwrap_or("Your");
        Some(format!("{name}, your appointment has already been submitted!"))
    }

    /// Only non-PII answers go to the remote classifier. Name, email, phone and
    /// address are never sent to the model, so for those fields abuse is not
    /// detected and the format check in [`validate`] is the only screen.
    /// A classifier fault lets the input through.
    async fn is_abusive(&self, field: FieldName, value: &str) -> bool {
        if field.is_pii() || value.is_empty() {
            return false;
        }
        match self.assistant.classify_abuse(value).await {
            Ok(flagged) => flagged,
            Err(e) => {
                tracing::warn!(error = %e, "abuse check failed, accepting input");
                false
            }
        }
    }

    async fn book(
        &self,
        state: &ConversationState,
        session_id: &str,
    ) -> Result<(String, u64), TurnError> {
        let Redacted { redacted, mapping } = redact(&state.answers);

        let start = Instant::now();
        let extraction = self
            .assistant
            .extract_booking(&redacted)
            .await
            .map_err(|e| TurnError::CollaboratorUnavailable(e.to_string()))?;
        let latency_ms = start.elapsed().as_millis() as u64;

        let kind = extraction.kind();
        let summary = unredact(&extraction.into_message(), &mapping);

        let mut extra_fields = serde_json::Map::new();
        extra_fields.insert("extraction".to_string(), kind.into());
        extra_fields.insert("latency_ms".to_string(), latency_ms.into());

        let record = BookingRecord {
            id: state.conversation_id.to_string(),
            session_id: session_id.to_string(),
            raw_input: state.answers.clone(),
            llm_summary: summary.clone(),
            alert_flag: false,
            extra_fields,
            created_at: Utc::now().naive_utc(),
        };

        self.sink
            .store(&record)
            .await
            .map_err(|e| TurnError::PersistenceFailed(e.to_string()))?;

        Ok((summary, latency_ms))
    }
}

fn fallback_acknowledgment(field: FieldName) -> String {
    format!("Noted your {field}.")
}
