use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One block of message content in the Messages API wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
    /// Block types this client does not handle (thinking, images, ...).
    #[serde(other)]
    Unsupported,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::text(content)],
        }
    }

    pub fn assistant_blocks(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content: results,
        }
    }
}

/// Tool advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone)]
pub struct MessageRequest {
    pub system: String,
    pub messages: Vec<Message>,
    /// Empty means the call is made without tool access.
    pub tools: Vec<ToolDefinition>,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<StopReason>,
}

impl MessageResponse {
    pub fn wants_tools(&self) -> bool {
        self.stop_reason == Some(StopReason::ToolUse) && self.tool_uses().next().is_some()
    }

    pub fn tool_uses(&self) -> impl Iterator<Item = (&str, &str, &Value)> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::ToolUse { id, name, input } => Some((id.as_str(), name.as_str(), input)),
            _ => None,
        })
    }

    /// Concatenated text blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Content that can be echoed back in the next request.
    pub fn replayable_content(&self) -> Vec<ContentBlock> {
        self.content
            .iter()
            .filter(|block| !matches!(block, ContentBlock::Unsupported))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_tool_use_response() {
        let raw = json!({
            "id": "msg_1",
            "content": [
                { "type": "text", "text": "Let me check." },
                { "type": "tool_use", "id": "toolu_1", "name": "search_course_content",
                  "input": { "query": "mcp" } },
                { "type": "thinking", "thinking": "..." }
            ],
            "stop_reason": "tool_use"
        });
        let response: MessageResponse = serde_json::from_value(raw).unwrap();

        assert!(response.wants_tools());
        assert_eq!(response.text(), "Let me check.");
        let (id, name, input) = response.tool_uses().next().unwrap();
        assert_eq!(id, "toolu_1");
        assert_eq!(name, "search_course_content");
        assert_eq!(input["query"], "mcp");
        assert_eq!(response.replayable_content().len(), 2);
    }

    #[test]
    fn tool_result_omits_false_error_flag() {
        let ok = ContentBlock::ToolResult {
            tool_use_id: "t".into(),
            content: "done".into(),
            is_error: false,
        };
        let failed = ContentBlock::ToolResult {
            tool_use_id: "t".into(),
            content: "boom".into(),
            is_error: true,
        };
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({ "type": "tool_result", "tool_use_id": "t", "content": "done" })
        );
        assert_eq!(serde_json::to_value(&failed).unwrap()["is_error"], true);
    }

    #[test]
    fn unknown_stop_reason_is_tolerated() {
        let response: MessageResponse =
            serde_json::from_value(json!({ "content": [], "stop_reason": "refusal" })).unwrap();
        assert_eq!(response.stop_reason, Some(StopReason::Other));
        assert!(!response.wants_tools());
    }
}
