use serde::Deserialize;

use super::ToolOutput;
use crate::core::errors::ApiError;
use crate::documents::{Course, Source};
use crate::rag::VectorStore;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OutlineArgs {
    pub course_name: String,
}

pub(super) async fn run(store: &dyn VectorStore, args: &OutlineArgs) -> Result<ToolOutput, ApiError> {
    let Some(title) = store.resolve_course_name(&args.course_name).await? else {
        return Ok(ToolOutput::text(format!(
            "No course found matching '{}'",
            args.course_name
        )));
    };

    let Some(course) = store.get_course(&title).await? else {
        return Ok(ToolOutput::text(format!(
            "No course found matching '{}'",
            args.course_name
        )));
    };

    Ok(ToolOutput {
        content: render(&course),
        sources: vec![Source::new(&course.title, None, course.course_link.clone())],
    })
}

fn render(course: &Course) -> String {
    let mut lines = vec![format!("**{}**", course.title)];
    if let Some(instructor) = &course.instructor {
        lines.push(format!("*Instructor: {}*", instructor));
    }
    if let Some(link) = &course.course_link {
        lines.push(format!("*Course Link: {}*", link));
    }
    lines.push(String::new());
    lines.push("**Course Outline:**".to_string());

    let mut lessons: Vec<_> = course.lessons.iter().collect();
    lessons.sort_by_key(|lesson| lesson.lesson_number);
    if lessons.is_empty() {
        lines.push("No lessons listed.".to_string());
    }
    for lesson in lessons {
        lines.push(format!("Lesson {}: {}", lesson.lesson_number, lesson.title));
    }

    lines.join("\n")
}
