use serde::Serialize;
use uuid::Uuid;

use crate::errors::{AppError, TurnError};
use crate::models::{ConversationState, FieldName, Phase, TranscriptEntry};
use crate::services::conversation::ConversationMachine;
use crate::services::sessions::SessionRegistry;

#[derive(Debug, Clone)]
pub enum ChatEvent {
    View,
    Message(String),
    Consent(bool),
    Reset,
}

/// Everything the chat surface needs to render one session.
#[derive(Debug, Clone, Serialize)]
pub struct ChatView {
    pub session_id: Uuid,
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_field: Option<FieldName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub awaiting_consent: bool,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    pub transcript: Vec<TranscriptEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub view: ChatView,
}

/// Feeds user events to the conversation machine, one session at a time.
pub struct ChatDriver {
    machine: ConversationMachine,
    sessions: SessionRegistry,
}

impl ChatDriver {
    pub fn new(machine: ConversationMachine, sessions: SessionRegistry) -> Self {
        Self { machine, sessions }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub async fn start(&self) -> Result<ChatView, AppError> {
        let mut state = ConversationState::new();
        self.machine.ask_pending(&mut state);

        let (session_id, handle) = self
            .sessions
            .insert(state)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        tracing::info!(session = %session_id, "session started");

        let state = handle.lock().await;
        Ok(self.view(session_id, &state))
    }

    pub async fn handle(&self, session_id: Uuid, event: ChatEvent) -> Result<TurnOutcome, AppError> {
        let handle = self
            .sessions
            .get(session_id)
            .map_err(|e| AppError::Internal(e.to_string()))?
            .ok_or_else(|| AppError::NotFound(format!("session {session_id}")))?;
        let mut state = handle.lock().await;

        let result: Result<(), TurnError> = match event {
            ChatEvent::View => Ok(()),
            ChatEvent::Message(text) => self.machine.answer(&mut state, &text).await,
            ChatEvent::Consent(consent) => {
                self.machine
                    .submit(&mut state, &session_id.to_string(), consent)
                    .await
            }
            ChatEvent::Reset => {
                tracing::info!(session = %session_id, "session reset");
                self.machine.reset(&mut state);
                Ok(())
            }
        };

        self.machine.ask_pending(&mut state);
        state.touch();

        let warning = match result {
            Ok(()) => None,
            Err(e) => {
                tracing::info!(session = %session_id, phase = state.phase.as_str(), reason = %e, "turn rejected");
                Some(e.to_string())
            }
        };

        Ok(TurnOutcome {
            success: warning.is_none(),
            warning,
            view: self.view(session_id, &state),
        })
    }

    fn view(&self, session_id: Uuid, state: &ConversationState) -> ChatView {
        let question = self.machine.current_question(state);
        ChatView {
            session_id,
            phase: state.phase,
            current_field: question.map(|q| q.field),
            prompt: question.map(|q| q.prompt.clone()),
            awaiting_consent: matches!(state.phase, Phase::AwaitingConsent | Phase::Submitting),
            completed: state.is_completed(),
            notice: self.machine.completion_notice(state),
            transcript: state.transcript.clone(),
        }
    }
}
