//! Course documents: data model, file parser and chunker.

pub mod chunker;
pub mod models;
pub mod parser;

pub use chunker::{ChunkError, Chunker, TextWindow};
pub use models::{Course, CourseChunk, Lesson, Source};
pub use parser::{parse_course_file, parse_course_text, ParseError, ParsedCourse};
