//! Tool-calling loop around the language model.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::core::errors::ApiError;
use crate::documents::Source;
use crate::llm::{ContentBlock, LlmProvider, Message, MessageRequest};
use crate::tools::{ToolManager, ToolRequest};

const SYSTEM_PROMPT: &str = "You are an assistant for course materials and educational content. \
You can call tools to look things up in the course catalog.

Tool usage:
- Use `get_course_outline` for questions about a course's structure, lesson list or overview.
- Use `search_course_content` for questions about specific topics or details inside course lessons.
- Answer general knowledge questions from your own knowledge without tools.
- You may use tools over several rounds when a question needs it, for example fetching an outline \
to find a lesson topic and then searching for that topic.
- If the tools return nothing useful, say so plainly.

When giving a course outline, include the course title, the instructor and course link when \
known, and every lesson as \"Lesson X: Title\".

Answer directly and briefly. Do not describe your reasoning or mention tool results.";

const EMPTY_RESPONSE: &str = "I apologize, but I received an empty response.";

/// Per-result cap for the tool summary carried into later rounds.
const SUMMARY_CHARS: usize = 300;

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    pub answer: String,
    pub sources: Vec<Source>,
    pub tool_rounds: usize,
}

pub struct AiGenerator {
    provider: Arc<dyn LlmProvider>,
    temperature: f64,
    max_tokens: u32,
    max_tool_rounds: usize,
}

impl AiGenerator {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        temperature: f64,
        max_tokens: u32,
        max_tool_rounds: usize,
    ) -> Self {
        Self {
            provider,
            temperature,
            max_tokens,
            max_tool_rounds,
        }
    }

    /// Base prompt, then history, then the round banner. Rounds count model
    /// calls, so the tool-less closing call is the last round.
    fn system_prompt(&self, history: Option<&str>, round: usize, tool_results: &[String]) -> String {
        let mut prompt = SYSTEM_PROMPT.to_string();
        if let Some(history) = history {
            prompt.push_str("\n\nPrevious conversation:\n");
            prompt.push_str(history);
        }

        let total = self.max_tool_rounds + 1;
        let current = round + 1;
        prompt.push_str(&format!("\n\nCURRENT ROUND: {}/{}", current, total));

        if current == 1 {
            prompt.push_str("\nThis is your first round. Use tools strategically for information gathering.");
        } else if current >= total {
            prompt.push_str("\nThis is your final round. Synthesize information and provide a complete answer.");
            if !tool_results.is_empty() {
                prompt.push_str("\n\nPrevious tool results summary:\n");
                prompt.push_str(&summarize(tool_results));
            }
        } else {
            prompt.push_str("\nContinue gathering information or refine your search based on previous results.");
            if !tool_results.is_empty() {
                prompt.push_str("\n\nPrevious tool results:\n");
                prompt.push_str(&summarize(tool_results));
            }
        }

        prompt
    }

    /// Runs up to `max_tool_rounds` tool rounds. If the model still asks for
    /// tools after the last round, a final call without tools forces an answer.
    pub async fn generate(
        &self,
        query: &str,
        history: Option<&str>,
        tools: &ToolManager,
    ) -> Result<GeneratedAnswer, ApiError> {
        let definitions = tools.definitions();
        let mut messages = vec![Message::user(query)];
        let mut sources: Vec<Source> = Vec::new();
        let mut tool_results: Vec<String> = Vec::new();
        let mut round = 0;

        loop {
            let offer_tools = round < self.max_tool_rounds;
            let request = MessageRequest {
                system: self.system_prompt(history, round, &tool_results),
                messages: messages.clone(),
                tools: if offer_tools {
                    definitions.clone()
                } else {
                    Vec::new()
                },
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            };

            let response = self.provider.create_message(request).await?;

            if !offer_tools || !response.wants_tools() {
                let mut answer = response.text();
                if answer.trim().is_empty() {
                    warn!("Model returned no text after {} tool round(s)", round);
                    answer = EMPTY_RESPONSE.to_string();
                }
                return Ok(GeneratedAnswer {
                    answer,
                    sources,
                    tool_rounds: round,
                });
            }

            round += 1;
            debug!("Tool round {} of {}", round, self.max_tool_rounds);

            let mut results = Vec::new();
            for (id, name, input) in response.tool_uses() {
                let result = self.run_tool(tools, id, name, input, &mut sources).await;
                if let ContentBlock::ToolResult { content, .. } = &result {
                    tool_results.push(content.clone());
                }
                results.push(result);
            }

            messages.push(Message::assistant_blocks(response.replayable_content()));
            messages.push(Message::tool_results(results));
        }
    }

    async fn run_tool(
        &self,
        tools: &ToolManager,
        id: &str,
        name: &str,
        input: &Value,
        sources: &mut Vec<Source>,
    ) -> ContentBlock {
        let request = ToolRequest {
            name: name.to_string(),
            input: input.clone(),
        };

        match tools.execute(&request).await {
            Ok(output) => {
                for source in output.sources {
                    if !sources.contains(&source) {
                        sources.push(source);
                    }
                }
                ContentBlock::ToolResult {
                    tool_use_id: id.to_string(),
                    content: output.content,
                    is_error: false,
                }
            }
            Err(err) => {
                warn!("Tool call {} failed: {}", name, err);
                ContentBlock::ToolResult {
                    tool_use_id: id.to_string(),
                    content: err.to_string(),
                    is_error: true,
                }
            }
        }
    }
}

fn summarize(tool_results: &[String]) -> String {
    tool_results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            let truncated = if result.chars().count() > SUMMARY_CHARS {
                format!("{}...", result.chars().take(SUMMARY_CHARS).collect::<String>())
            } else {
                result.clone()
            };
            format!("Result {}: {}", i + 1, truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
