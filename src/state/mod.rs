use std::sync::Arc;

use crate::assistant::RagSystem;
use crate::core::config::{AppPaths, ConfigService, Settings};
use crate::llm::{AnthropicProvider, LlmProvider};
use crate::rag::{build_embedder, SqliteVectorStore, VectorStore};

pub mod error;

use error::InitializationError;

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub settings: Settings,
    pub rag: Arc<RagSystem>,
}

impl AppState {
    /// Loads configuration, opens the course index and builds the LLM client.
    ///
    /// Ingestion is not run here; call [`RagSystem::initialize`] before serving.
    pub async fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());
        let value = config
            .load_config()
            .map_err(|e| InitializationError::Config(e.into()))?;
        tracing::debug!(
            "Loaded config from {}: {}",
            config.config_path().display(),
            config.redact_sensitive_values(&value)
        );
        let settings = Settings::from_config(&value, &paths);

        let embedder = build_embedder(&settings.embedding)
            .map_err(|e| InitializationError::Embedder(e.into()))?;
        tracing::info!(
            "Using {} embeddings ({} dims)",
            embedder.name(),
            settings.embedding.dimensions
        );

        let store: Arc<dyn VectorStore> = Arc::new(
            SqliteVectorStore::open(settings.rag.index_path.clone(), embedder)
                .await
                .map_err(|e| InitializationError::Index(e.into()))?,
        );

        if settings.llm.api_key.is_none() {
            tracing::warn!("ANTHROPIC_API_KEY is not set; queries will fail until it is configured");
        }
        let provider: Arc<dyn LlmProvider> = Arc::new(
            AnthropicProvider::new(&settings.llm).map_err(|e| InitializationError::Llm(e.into()))?,
        );

        Self::from_parts(paths, config, settings, store, provider)
    }

    /// Assembles state from already-built components.
    pub fn from_parts(
        paths: Arc<AppPaths>,
        config: ConfigService,
        settings: Settings,
        store: Arc<dyn VectorStore>,
        provider: Arc<dyn LlmProvider>,
    ) -> Result<Arc<Self>, InitializationError> {
        let rag = RagSystem::new(&settings.rag, &settings.llm, store, provider)
            .map_err(|e| InitializationError::Chunking(e.into()))?;

        Ok(Arc::new(AppState {
            paths,
            config,
            settings,
            rag: Arc::new(rag),
        }))
    }
}
