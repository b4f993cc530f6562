//! Typed view over the merged YAML configuration.

use std::env;
use std::path::PathBuf;

use serde_json::Value;

use super::defaults;
use super::paths::AppPaths;

#[derive(Debug, Clone)]
pub struct Settings {
    pub rag: RagSettings,
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub server: ServerSettings,
}

#[derive(Debug, Clone)]
pub struct RagSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_results: usize,
    /// Number of user/assistant exchanges kept per session.
    pub max_history: usize,
    pub max_tool_rounds: usize,
    pub docs_dir: PathBuf,
    pub index_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingProviderKind {
    Hash,
    OpenAi,
}

#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProviderKind,
    pub dimensions: usize,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl Settings {
    pub fn from_config(config: &Value, paths: &AppPaths) -> Self {
        Self::from_config_with_env(config, paths, |key| env::var(key).ok())
    }

    /// Same as [`Settings::from_config`] with an injectable environment lookup.
    pub fn from_config_with_env<F>(config: &Value, paths: &AppPaths, lookup_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let rag = config.get("rag");
        let llm = config.get("llm");
        let embedding = config.get("embedding");
        let server = config.get("server");

        let docs_dir = get_str(rag, "docs_dir").unwrap_or(defaults::DOCS_DIR);
        let index_path = get_str(rag, "index_path").unwrap_or(defaults::INDEX_PATH);

        let rag = RagSettings {
            chunk_size: get_usize(rag, "chunk_size").unwrap_or(defaults::CHUNK_SIZE),
            chunk_overlap: get_usize(rag, "chunk_overlap").unwrap_or(defaults::CHUNK_OVERLAP),
            max_results: get_usize(rag, "max_results").unwrap_or(defaults::MAX_RESULTS),
            max_history: get_usize(rag, "max_history").unwrap_or(defaults::MAX_HISTORY),
            max_tool_rounds: get_usize(rag, "max_tool_rounds")
                .unwrap_or(defaults::MAX_TOOL_ROUNDS),
            docs_dir: AppPaths::resolve(&paths.project_root, docs_dir),
            index_path: AppPaths::resolve(&paths.user_data_dir, index_path),
        };

        let llm = LlmSettings {
            model: get_str(llm, "model")
                .unwrap_or(defaults::LLM_MODEL)
                .to_string(),
            base_url: get_str(llm, "base_url")
                .unwrap_or(defaults::LLM_BASE_URL)
                .to_string(),
            api_key: lookup_env("ANTHROPIC_API_KEY")
                .filter(|key| !key.trim().is_empty())
                .or_else(|| non_empty(get_str(llm, "api_key"))),
            temperature: llm
                .and_then(|v| v.get("temperature"))
                .and_then(Value::as_f64)
                .unwrap_or(defaults::LLM_TEMPERATURE),
            max_tokens: llm
                .and_then(|v| v.get("max_tokens"))
                .and_then(Value::as_u64)
                .map(|v| v as u32)
                .unwrap_or(defaults::LLM_MAX_TOKENS),
            timeout_secs: llm
                .and_then(|v| v.get("timeout_secs"))
                .and_then(Value::as_u64)
                .unwrap_or(defaults::LLM_TIMEOUT_SECS),
        };

        let provider = match get_str(embedding, "provider") {
            Some("openai") => EmbeddingProviderKind::OpenAi,
            _ => EmbeddingProviderKind::Hash,
        };
        let embedding = EmbeddingSettings {
            provider,
            dimensions: get_usize(embedding, "dimensions")
                .unwrap_or(defaults::EMBEDDING_DIMENSIONS),
            model: get_str(embedding, "model")
                .unwrap_or(defaults::EMBEDDING_MODEL)
                .to_string(),
            base_url: get_str(embedding, "base_url")
                .unwrap_or(defaults::EMBEDDING_BASE_URL)
                .to_string(),
            api_key: lookup_env("OPENAI_API_KEY")
                .filter(|key| !key.trim().is_empty())
                .or_else(|| non_empty(get_str(embedding, "api_key"))),
        };

        let cors_allowed_origins = server
            .and_then(|v| v.get("cors_allowed_origins"))
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|list| !list.is_empty())
            .unwrap_or_else(defaults::default_local_origins);

        let server = ServerSettings {
            host: get_str(server, "host")
                .unwrap_or(defaults::SERVER_HOST)
                .to_string(),
            port: lookup_env("PORT")
                .and_then(|val| val.parse::<u16>().ok())
                .or_else(|| {
                    server
                        .and_then(|v| v.get("port"))
                        .and_then(Value::as_u64)
                        .map(|v| v as u16)
                })
                .unwrap_or(defaults::SERVER_PORT),
            cors_allowed_origins,
        };

        Settings {
            rag,
            llm,
            embedding,
            server,
        }
    }
}

fn get_str<'a>(section: Option<&'a Value>, key: &str) -> Option<&'a str> {
    section.and_then(|v| v.get(key)).and_then(Value::as_str)
}

fn get_usize(section: Option<&Value>, key: &str) -> Option<usize> {
    section
        .and_then(|v| v.get(key))
        .and_then(Value::as_u64)
        .map(|v| v as usize)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
