use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AnswerSet;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "state", content = "index", rename_all = "snake_case")]
pub enum Phase {
    Asking(usize),
    AwaitingConsent,
    Submitting,
    Completed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Asking(_) => "asking",
            Phase::AwaitingConsent => "awaiting_consent",
            Phase::Submitting => "submitting",
            Phase::Completed => "completed",
        }
    }
}

/// Everything one chat session knows. Owned by the session registry and only
/// ever mutated by the conversation machine.
#[derive(Debug, Clone)]
pub struct ConversationState {
    /// Identity of the current conversation lifetime; a new one starts on reset.
    pub conversation_id: Uuid,
    pub phase: Phase,
    pub answers: AnswerSet,
    pub transcript: Vec<TranscriptEntry>,
    pub submitted: bool,
    pub last_activity: NaiveDateTime,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationState {
    pub fn new() -> Self {
        Self {
            conversation_id: Uuid::new_v4(),
            phase: Phase::Asking(0),
            answers: AnswerSet::new(),
            transcript: Vec::new(),
            submitted: false,
            last_activity: Utc::now().naive_utc(),
        }
    }

    /// Number of validated answers stored so far.
    pub fn current_index(&self) -> usize {
        self.answers.len()
    }

    pub fn is_completed(&self) -> bool {
        self.phase == Phase::Completed
    }

    pub fn last_is_assistant(&self) -> bool {
        self.transcript
            .last()
            .map(|e| e.speaker == Speaker::Assistant)
            .unwrap_or(false)
    }

    pub fn push(&mut self, speaker: Speaker, text: impl Into<String>, latency_ms: Option<u64>) {
        self.transcript.push(TranscriptEntry {
            speaker,
            text: text.into(),
            latency_ms,
        });
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now().naive_utc();
    }

    pub fn reset(&mut self) {
        self.conversation_id = Uuid::new_v4();
        self.phase = Phase::Asking(0);
        self.answers.clear();
        self.transcript.clear();
        self.submitted = false;
        self.touch();
    }
}
