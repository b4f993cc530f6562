use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn course_stats(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let analytics = state.rag.course_analytics().await?;
    Ok(Json(analytics))
}
