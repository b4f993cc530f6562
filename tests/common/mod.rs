#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, Response};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use course_rag_backend::core::config::{AppPaths, ConfigService, Settings};
use course_rag_backend::core::errors::ApiError;
use course_rag_backend::llm::{
    ContentBlock, LlmProvider, MessageRequest, MessageResponse, StopReason,
};
use course_rag_backend::rag::{HashEmbedder, SqliteVectorStore, VectorStore};
use course_rag_backend::state::AppState;

pub fn fixture_docs() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/courses")
}

/// LLM stand-in that replays canned responses and records each request.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<MessageResponse, ApiError>>>,
    requests: Mutex<Vec<MessageRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Result<MessageResponse, ApiError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<MessageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn create_message(&self, request: MessageRequest) -> Result<MessageResponse, ApiError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Upstream("script exhausted".to_string())))
    }
}

pub fn text_reply(text: &str) -> Result<MessageResponse, ApiError> {
    Ok(MessageResponse {
        content: vec![ContentBlock::Text {
            text: text.to_string(),
        }],
        stop_reason: Some(StopReason::EndTurn),
    })
}

pub fn tool_reply(id: &str, name: &str, input: Value) -> Result<MessageResponse, ApiError> {
    Ok(MessageResponse {
        content: vec![ContentBlock::ToolUse {
            id: id.to_string(),
            name: name.to_string(),
            input,
        }],
        stop_reason: Some(StopReason::ToolUse),
    })
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub store: Arc<dyn VectorStore>,
    _tmp: TempDir,
}

/// Builds the full app on a temp index, ingesting `docs_dir` before returning.
pub async fn spawn_app(docs_dir: &Path, provider: Arc<dyn LlmProvider>) -> TestApp {
    let tmp = tempfile::tempdir().unwrap();
    let paths = Arc::new(AppPaths::with_dirs(
        tmp.path().join("root"),
        tmp.path().join("data"),
    ));
    let config = json!({
        "rag": {
            "chunk_size": 200,
            "chunk_overlap": 40,
            "docs_dir": docs_dir.to_string_lossy(),
        },
        "embedding": { "dimensions": 256 }
    });
    let settings = Settings::from_config_with_env(&config, &paths, |_| None);

    let store: Arc<dyn VectorStore> = Arc::new(
        SqliteVectorStore::open(
            settings.rag.index_path.clone(),
            Arc::new(HashEmbedder::new(settings.embedding.dimensions)),
        )
        .await
        .unwrap(),
    );

    let state = AppState::from_parts(
        paths.clone(),
        ConfigService::new(paths),
        settings,
        store.clone(),
        provider,
    )
    .unwrap();
    state.rag.initialize().await.unwrap();

    TestApp {
        router: course_rag_backend::server::router::router(state.clone()),
        state,
        store,
        _tmp: tmp,
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> (u16, Value) {
    let response: Response<Body> = router.clone().oneshot(request).await.unwrap();
    let status = response.status().as_u16();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}
