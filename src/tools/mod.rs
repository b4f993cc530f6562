//! Tools the model can call, and the manager that dispatches them.

mod outline;
mod search;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::core::errors::ApiError;
use crate::documents::Source;
use crate::llm::ToolDefinition;
use crate::rag::VectorStore;

pub use outline::OutlineArgs;
pub use search::SearchArgs;

pub const SEARCH_COURSE_CONTENT: &str = "search_course_content";
pub const GET_COURSE_OUTLINE: &str = "get_course_outline";

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid input for {tool}: {message}")]
    InvalidInput { tool: String, message: String },
    #[error("Tool {tool} failed: {source}")]
    Store {
        tool: String,
        #[source]
        source: ApiError,
    },
}

/// A tool call as requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub name: String,
    pub input: Value,
}

/// Tool text handed back to the model, plus the citations it produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    pub content: String,
    pub sources: Vec<Source>,
}

impl ToolOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sources: Vec::new(),
        }
    }
}

/// The fixed mapping from tool name to typed arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum CourseTool {
    SearchContent(SearchArgs),
    Outline(OutlineArgs),
}

impl CourseTool {
    pub fn parse(request: &ToolRequest) -> Result<Self, ToolError> {
        match request.name.as_str() {
            SEARCH_COURSE_CONTENT => Ok(CourseTool::SearchContent(parse_input(request)?)),
            GET_COURSE_OUTLINE => Ok(CourseTool::Outline(parse_input(request)?)),
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}

fn parse_input<T: DeserializeOwned>(request: &ToolRequest) -> Result<T, ToolError> {
    serde_json::from_value(request.input.clone()).map_err(|e| ToolError::InvalidInput {
        tool: request.name.clone(),
        message: e.to_string(),
    })
}

pub struct ToolManager {
    store: Arc<dyn VectorStore>,
    max_results: usize,
}

impl ToolManager {
    pub fn new(store: Arc<dyn VectorStore>, max_results: usize) -> Self {
        Self { store, max_results }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: SEARCH_COURSE_CONTENT.to_string(),
                description: "Search course materials with smart course name matching and lesson filtering".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "What to search for in the course content"
                        },
                        "course_name": {
                            "type": "string",
                            "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction')"
                        },
                        "lesson_number": {
                            "type": "integer",
                            "description": "Specific lesson number to search within (e.g. 1, 2, 3)"
                        }
                    },
                    "required": ["query"]
                }),
            },
            ToolDefinition {
                name: GET_COURSE_OUTLINE.to_string(),
                description: "Get the outline of a course: title, link, instructor and the full lesson list".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "course_name": {
                            "type": "string",
                            "description": "Course title (partial matches work)"
                        }
                    },
                    "required": ["course_name"]
                }),
            },
        ]
    }

    pub async fn execute(&self, request: &ToolRequest) -> Result<ToolOutput, ToolError> {
        debug!("Dispatching tool {} with input {}", request.name, request.input);

        let tool = CourseTool::parse(request)?;
        let result = match &tool {
            CourseTool::SearchContent(args) => {
                search::run(self.store.as_ref(), args, self.max_results).await
            }
            CourseTool::Outline(args) => outline::run(self.store.as_ref(), args).await,
        };

        result.map_err(|source| ToolError::Store {
            tool: request.name.clone(),
            source,
        })
    }
}
