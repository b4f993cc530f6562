use serde_json::{Map, Value};

use crate::core::errors::ApiError;

pub fn validate_config(config: &Value) -> Result<(), ApiError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(rag) = expect_optional_object(root, "rag")? {
        validate_u64_field(rag, "rag.chunk_size", "chunk_size", 1, 1_000_000)?;
        validate_u64_field(rag, "rag.chunk_overlap", "chunk_overlap", 0, 1_000_000)?;
        validate_u64_field(rag, "rag.max_results", "max_results", 1, 1_000)?;
        validate_u64_field(rag, "rag.max_history", "max_history", 0, 1_000)?;
        validate_u64_field(rag, "rag.max_tool_rounds", "max_tool_rounds", 1, 16)?;
        validate_optional_string_field(rag, "rag.docs_dir", "docs_dir")?;
        validate_optional_string_field(rag, "rag.index_path", "index_path")?;

        let size = rag.get("chunk_size").and_then(Value::as_u64);
        let overlap = rag.get("chunk_overlap").and_then(Value::as_u64);
        let effective_size = size.unwrap_or(super::defaults::CHUNK_SIZE as u64);
        let effective_overlap = overlap.unwrap_or(super::defaults::CHUNK_OVERLAP as u64);
        if effective_overlap >= effective_size {
            return Err(ApiError::BadRequest(format!(
                "Invalid config at 'rag.chunk_overlap': must be smaller than chunk_size ({})",
                effective_size
            )));
        }
    }

    if let Some(llm) = expect_optional_object(root, "llm")? {
        validate_enum_field(llm, "llm.provider", "provider", &["anthropic"])?;
        validate_optional_string_field(llm, "llm.model", "model")?;
        validate_optional_string_field(llm, "llm.base_url", "base_url")?;
        validate_optional_string_field(llm, "llm.api_key", "api_key")?;
        validate_u64_field(llm, "llm.max_tokens", "max_tokens", 1, 200_000)?;
        validate_u64_field(llm, "llm.timeout_secs", "timeout_secs", 1, 3_600)?;
        validate_f64_field(llm, "llm.temperature", "temperature", 0.0, 2.0)?;
    }

    if let Some(embedding) = expect_optional_object(root, "embedding")? {
        validate_enum_field(embedding, "embedding.provider", "provider", &["hash", "openai"])?;
        validate_u64_field(embedding, "embedding.dimensions", "dimensions", 8, 16_384)?;
        validate_optional_string_field(embedding, "embedding.model", "model")?;
        validate_optional_string_field(embedding, "embedding.base_url", "base_url")?;
        validate_optional_string_field(embedding, "embedding.api_key", "api_key")?;
    }

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 0, 65_535)?;
        validate_string_array_field(
            server,
            "server.cors_allowed_origins",
            "cors_allowed_origins",
        )?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ApiError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(config_type_error(key, "object")),
    }
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_f64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
    };
    if number < min || number > max {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() || value.as_str().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "string"))
}

fn validate_enum_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    allowed: &[&str],
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if allowed.contains(&text) {
        return Ok(());
    }
    Err(ApiError::BadRequest(format!(
        "Invalid config at '{}': expected one of {}",
        path,
        allowed.join(", ")
    )))
}

fn validate_string_array_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(items) = value.as_array() else {
        return Err(config_type_error(path, "array of strings"));
    };
    for (index, item) in items.iter().enumerate() {
        let Some(text) = item.as_str() else {
            return Err(config_type_error(&format!("{}[{}]", path, index), "string"));
        };
        if text.trim().is_empty() {
            return Err(ApiError::BadRequest(format!(
                "Invalid config at '{}[{}]': value cannot be empty",
                path, index
            )));
        }
    }
    Ok(())
}

fn config_type_error(path: &str, expected: &str) -> ApiError {
    ApiError::BadRequest(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}
