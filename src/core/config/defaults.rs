//! Built-in values used when `config.yml` leaves a key unset.

pub const CHUNK_SIZE: usize = 800;
pub const CHUNK_OVERLAP: usize = 100;
pub const MAX_RESULTS: usize = 5;
pub const MAX_HISTORY: usize = 2;
pub const MAX_TOOL_ROUNDS: usize = 2;
pub const DOCS_DIR: &str = "docs";
pub const INDEX_PATH: &str = "course_index.db";

pub const LLM_MODEL: &str = "claude-sonnet-4-20250514";
pub const LLM_BASE_URL: &str = "https://api.anthropic.com";
pub const LLM_TEMPERATURE: f64 = 0.0;
pub const LLM_MAX_TOKENS: u32 = 800;
pub const LLM_TIMEOUT_SECS: u64 = 60;

pub const EMBEDDING_DIMENSIONS: usize = 384;
pub const EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const EMBEDDING_BASE_URL: &str = "https://api.openai.com";

pub const SERVER_HOST: &str = "127.0.0.1";
pub const SERVER_PORT: u16 = 8000;

pub fn default_local_origins() -> Vec<String> {
    vec![
        "http://localhost".to_string(),
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
        "http://localhost:8000".to_string(),
        "http://127.0.0.1".to_string(),
        "http://127.0.0.1:3000".to_string(),
        "http://127.0.0.1:5173".to_string(),
        "http://127.0.0.1:8000".to_string(),
    ]
}
