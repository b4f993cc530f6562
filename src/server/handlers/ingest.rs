use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct IngestRequest {
    #[serde(default)]
    pub clear_existing: bool,
}

/// Re-scans the documents directory. An absent body means `clear_existing: false`.
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<IngestRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let request = payload.map(|Json(body)| body).unwrap_or_default();
    let report = state
        .rag
        .ingest_directory(state.rag.docs_dir(), request.clear_existing)
        .await?;
    Ok(Json(report))
}
