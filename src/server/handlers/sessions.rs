use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ClearSessionRequest {
    pub session_id: String,
}

pub async fn clear_session(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ClearSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if state.rag.sessions().clear(&payload.session_id).await {
        tracing::debug!("Cleared session {}", payload.session_id);
    }
    Ok(Json(json!({ "message": "Session cleared successfully" })))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = state
        .rag
        .sessions()
        .get_history(&session_id)
        .await
        .ok_or_else(|| ApiError::NotFound("Session not found".to_string()))?;

    Ok(Json(json!({
        "session_id": session_id,
        "messages": messages
    })))
}
