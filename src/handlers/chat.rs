use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::services::driver::{ChatEvent, ChatView, TurnOutcome};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct MessageRequest {
    pub message: String,
}

#[derive(Deserialize)]
pub struct ConsentRequest {
    pub consent: bool,
}

// POST /api/sessions
pub async fn create_session(State(state): State<Arc<AppState>>) -> Result<Json<ChatView>, AppError> {
    Ok(Json(state.chat.start().await?))
}

// GET /api/sessions/:id
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ChatView>, AppError> {
    let outcome = state.chat.handle(id, ChatEvent::View).await?;
    Ok(Json(outcome.view))
}

// POST /api/sessions/:id/messages
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<MessageRequest>,
) -> Result<Json<TurnOutcome>, AppError> {
    let outcome = state
        .chat
        .handle(id, ChatEvent::Message(payload.message))
        .await?;
    Ok(Json(outcome))
}

// POST /api/sessions/:id/consent
pub async fn give_consent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ConsentRequest>,
) -> Result<Json<TurnOutcome>, AppError> {
    let outcome = state
        .chat
        .handle(id, ChatEvent::Consent(payload.consent))
        .await?;
    Ok(Json(outcome))
}

// POST /api/sessions/:id/reset
pub async fn reset_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TurnOutcome>, AppError> {
    let outcome = state.chat.handle(id, ChatEvent::Reset).await?;
    Ok(Json(outcome))
}
