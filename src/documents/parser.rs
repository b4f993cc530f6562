//! Parser for course script files.
//!
//! ```text
//! Course Title: Building Towards Computer Use
//! Course Link: https://example.com/course
//! Course Instructor: Jane Doe
//!
//! Lesson 0: Introduction
//! Lesson Link: https://example.com/course/lesson0
//! Lesson text...
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use super::models::{Course, Lesson};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("missing 'Course Title:' header")]
    MissingTitle,
    #[error("no 'Lesson <n>: <title>' sections found")]
    NoLessons,
    #[error("lesson {0} appears more than once")]
    DuplicateLesson(u32),
}

/// A parsed course file: metadata plus the raw body of each lesson, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCourse {
    pub course: Course,
    pub lesson_bodies: Vec<(Lesson, String)>,
}

fn header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*course\s+(title|link|instructor)\s*:\s*(.*?)\s*$")
            .expect("static header regex")
    })
}

fn lesson_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*lesson\s+(\d+)\s*:\s*(.*?)\s*$").expect("static lesson regex")
    })
}

fn lesson_link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*lesson\s+link\s*:\s*(.*?)\s*$").expect("static link regex")
    })
}

pub fn parse_course_file(path: &Path) -> Result<ParsedCourse, ParseError> {
    let bytes = fs::read(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8_lossy(&bytes);
    parse_course_text(&text)
}

pub fn parse_course_text(text: &str) -> Result<ParsedCourse, ParseError> {
    let lines: Vec<&str> = text.lines().collect();
    let mut cursor = 0;

    while cursor < lines.len() && lines[cursor].trim().is_empty() {
        cursor += 1;
    }

    let mut title = None;
    let mut course_link = None;
    let mut instructor = None;

    while cursor < lines.len() {
        let Some(caps) = header_regex().captures(lines[cursor]) else {
            break;
        };
        let value = caps[2].to_string();
        match caps[1].to_ascii_lowercase().as_str() {
            "title" => title = Some(value),
            "link" => course_link = non_empty(value),
            _ => instructor = non_empty(value),
        }
        cursor += 1;
    }

    let title = title
        .filter(|t| !t.is_empty())
        .ok_or(ParseError::MissingTitle)?;

    let mut lesson_bodies: Vec<(Lesson, String)> = Vec::new();
    let mut current: Option<(Lesson, Vec<&str>)> = None;

    while cursor < lines.len() {
        let line = lines[cursor];
        cursor += 1;

        if let Some(caps) = lesson_regex().captures(line) {
            if let Some((lesson, body)) = current.take() {
                lesson_bodies.push((lesson, join_body(&body)));
            }

            let lesson_number: u32 = caps[1].parse().map_err(|_| ParseError::NoLessons)?;
            if lesson_bodies
                .iter()
                .any(|(lesson, _)| lesson.lesson_number == lesson_number)
            {
                return Err(ParseError::DuplicateLesson(lesson_number));
            }

            let mut lesson_link = None;
            if let Some(next) = lines.get(cursor) {
                if let Some(link_caps) = lesson_link_regex().captures(next) {
                    lesson_link = non_empty(link_caps[1].to_string());
                    cursor += 1;
                }
            }

            current = Some((
                Lesson {
                    lesson_number,
                    title: caps[2].to_string(),
                    lesson_link,
                },
                Vec::new(),
            ));
            continue;
        }

        if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
    }

    if let Some((lesson, body)) = current.take() {
        lesson_bodies.push((lesson, join_body(&body)));
    }

    if lesson_bodies.is_empty() {
        return Err(ParseError::NoLessons);
    }

    let course = Course {
        title,
        course_link,
        instructor,
        lessons: lesson_bodies.iter().map(|(lesson, _)| lesson.clone()).collect(),
    };

    Ok(ParsedCourse {
        course,
        lesson_bodies,
    })
}

fn join_body(lines: &[&str]) -> String {
    lines.join("\n").trim().to_string()
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
