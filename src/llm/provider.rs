use async_trait::async_trait;

use super::types::{MessageRequest, MessageResponse};
use crate::core::errors::ApiError;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// return the provider name (e.g. "anthropic")
    fn name(&self) -> &str;

    /// one non-streaming "create message" call, tools included when the request has any
    async fn create_message(&self, request: MessageRequest) -> Result<MessageResponse, ApiError>;
}
