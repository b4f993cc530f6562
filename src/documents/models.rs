use serde::{Deserialize, Serialize};

/// A course as declared in its source file. `title` is the identity key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub title: String,
    pub course_link: Option<String>,
    pub instructor: Option<String>,
    pub lessons: Vec<Lesson>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub lesson_number: u32,
    pub title: String,
    pub lesson_link: Option<String>,
}

impl Course {
    pub fn lesson(&self, lesson_number: u32) -> Option<&Lesson> {
        self.lessons
            .iter()
            .find(|lesson| lesson.lesson_number == lesson_number)
    }
}

/// A window of lesson text as stored in the content index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseChunk {
    pub course_title: String,
    pub lesson_number: Option<u32>,
    /// Position of the chunk across the whole course.
    pub chunk_index: usize,
    /// Character offset of `content` within its lesson body.
    pub start_offset: usize,
    pub content: String,
}

impl CourseChunk {
    pub fn chunk_id(&self) -> String {
        format!("{}_{}", self.course_title, self.chunk_index)
    }

    /// Text handed to the embedder: the raw content behind a short context header.
    pub fn embedding_text(&self) -> String {
        match self.lesson_number {
            Some(number) => format!(
                "Course {} Lesson {} content: {}",
                self.course_title, number, self.content
            ),
            None => format!("Course {} content: {}", self.course_title, self.content),
        }
    }
}

/// Citation returned alongside an answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Source {
    pub text: String,
    pub url: Option<String>,
}

impl Source {
    pub fn new(course_title: &str, lesson_number: Option<u32>, url: Option<String>) -> Self {
        let text = match lesson_number {
            Some(number) => format!("{} - Lesson {}", course_title, number),
            None => course_title.to_string(),
        };
        Self { text, url }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_joins_title_and_index() {
        let chunk = CourseChunk {
            course_title: "Intro to MCP".to_string(),
            lesson_number: Some(2),
            chunk_index: 7,
            start_offset: 0,
            content: "body".to_string(),
        };
        assert_eq!(chunk.chunk_id(), "Intro to MCP_7");
        assert_eq!(chunk.embedding_text(), "Course Intro to MCP Lesson 2 content: body");
    }

    #[test]
    fn source_label_omits_missing_lesson() {
        assert_eq!(Source::new("Course A", Some(1), None).text, "Course A - Lesson 1");
        assert_eq!(Source::new("Course B", None, None).text, "Course B");
    }
}
