use serde::Deserialize;

use super::ToolOutput;
use crate::core::errors::ApiError;
use crate::documents::Source;
use crate::rag::{SearchFilter, SearchHit, VectorStore};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchArgs {
    pub query: String,
    #[serde(default)]
    pub course_name: Option<String>,
    #[serde(default)]
    pub lesson_number: Option<u32>,
}

pub(super) async fn run(
    store: &dyn VectorStore,
    args: &SearchArgs,
    max_results: usize,
) -> Result<ToolOutput, ApiError> {
    let course_title = match args.course_name.as_deref() {
        Some(name) => match store.resolve_course_name(name).await? {
            Some(title) => Some(title),
            None => return Ok(ToolOutput::text(format!("No course found matching '{}'", name))),
        },
        None => None,
    };

    let filter = SearchFilter {
        course_title,
        lesson_number: args.lesson_number,
    };
    let hits = store.search(&args.query, max_results, &filter).await?;

    if hits.is_empty() {
        return Ok(ToolOutput::text(empty_message(args)));
    }

    let mut blocks = Vec::with_capacity(hits.len());
    let mut sources: Vec<Source> = Vec::new();

    for SearchHit { chunk, .. } in &hits {
        let header = match chunk.lesson_number {
            Some(number) => format!("[{} - Lesson {}]", chunk.course_title, number),
            None => format!("[{}]", chunk.course_title),
        };
        blocks.push(format!("{}\n{}", header, chunk.content));

        let url = match chunk.lesson_number {
            Some(number) => store.lesson_link(&chunk.course_title, number).await?,
            None => None,
        };
        let source = Source::new(&chunk.course_title, chunk.lesson_number, url);
        if !sources.contains(&source) {
            sources.push(source);
        }
    }

    Ok(ToolOutput {
        content: blocks.join("\n\n"),
        sources,
    })
}

fn empty_message(args: &SearchArgs) -> String {
    let mut message = String::from("No relevant content found");
    if let Some(name) = &args.course_name {
        message.push_str(&format!(" in course '{}'", name));
    }
    if let Some(number) = args.lesson_number {
        message.push_str(&format!(" in lesson {}", number));
    }
    message.push('.');
    message
}
