use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::StoredAppointment;
use crate::state::AppState;

fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

// GET /api/admin/status
#[derive(Serialize)]
pub struct StatusResponse {
    active_sessions: usize,
    appointments: i64,
}

pub async fn get_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<StatusResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let appointments = {
        let db = state
            .db
            .lock()
            .map_err(|_| AppError::Internal("database lock poisoned".to_string()))?;
        queries::count_appointments(&db)?
    };

    Ok(Json(StatusResponse {
        active_sessions: state.chat.sessions().len(),
        appointments,
    }))
}

// GET /api/admin/appointments
#[derive(Deserialize)]
pub struct AppointmentsQuery {
    pub limit: Option<i64>,
}

pub async fn get_appointments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AppointmentsQuery>,
) -> Result<Json<Vec<StoredAppointment>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let appointments = {
        let db = state
            .db
            .lock()
            .map_err(|_| AppError::Internal("database lock poisoned".to_string()))?;
        queries::list_appointments(&db, limit)?
    };

    Ok(Json(appointments))
}
