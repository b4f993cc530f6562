use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load configuration: {0}")]
    Config(#[source] anyhow::Error),

    #[error("Failed to initialize embedder: {0}")]
    Embedder(#[source] anyhow::Error),

    #[error("Failed to open course index: {0}")]
    Index(#[source] anyhow::Error),

    #[error("Failed to initialize LLM provider: {0}")]
    Llm(#[source] anyhow::Error),

    #[error("Invalid chunking settings: {0}")]
    Chunking(#[source] anyhow::Error),
}
