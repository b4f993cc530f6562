use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::error;

use super::provider::LlmProvider;
use super::types::{MessageRequest, MessageResponse};
use crate::core::config::LlmSettings;
use crate::core::errors::ApiError;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API client.
#[derive(Clone)]
pub struct AnthropicProvider {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: Client,
}

impl AnthropicProvider {
    pub fn new(settings: &LlmSettings) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(ApiError::internal)?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone(),
            client,
        })
    }

    fn build_body(&self, request: &MessageRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "system": request.system,
            "messages": request.messages,
        });

        if !request.tools.is_empty() {
            if let Some(obj) = body.as_object_mut() {
                obj.insert("tools".to_string(), json!(request.tools));
                obj.insert("tool_choice".to_string(), json!({ "type": "auto" }));
            }
        }

        body
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn create_message(&self, request: MessageRequest) -> Result<MessageResponse, ApiError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ApiError::Upstream("ANTHROPIC_API_KEY is not configured".to_string())
        })?;

        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_body(&request);

        let res = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Anthropic request failed: {}", e);
                ApiError::upstream(e)
            })?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            error!("Anthropic API returned {}: {}", status, text);
            return Err(ApiError::Upstream(format!(
                "Anthropic API error ({}): {}",
                status, text
            )));
        }

        res.json::<MessageResponse>().await.map_err(|e| {
            error!("Anthropic response could not be decoded: {}", e);
            ApiError::upstream(e)
        })
    }
}
