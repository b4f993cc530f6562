//! Sliding-window text chunker.
//!
//! Windows are `size` characters wide and advance by roughly `size - overlap`.
//! A window that does not reach the end of the text is pulled back to the last
//! sentence end (or, failing that, the last whitespace) in its second half, and
//! the following window starts on a word boundary inside the overlap region.
//! Offsets are char offsets, so multi-byte text never splits inside a scalar.

use thiserror::Error;

use super::models::CourseChunk;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkError {
    #[error("chunk size must be greater than zero")]
    ZeroSize,
    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({size})")]
    OverlapTooLarge { size: usize, overlap: usize },
}

#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

/// One window over the source text. `start`/`end` are char offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextWindow<'a> {
    pub start: usize,
    pub end: usize,
    pub text: &'a str,
}

impl Chunker {
    pub fn new(size: usize, overlap: usize) -> Result<Self, ChunkError> {
        if size == 0 {
            return Err(ChunkError::ZeroSize);
        }
        if overlap >= size {
            return Err(ChunkError::OverlapTooLarge { size, overlap });
        }
        Ok(Self { size, overlap })
    }

    /// Lazily yields windows over `text`. Each call starts a fresh pass.
    pub fn windows<'a>(&self, text: &'a str) -> Windows<'a> {
        Windows {
            text,
            chars: text.char_indices().collect(),
            size: self.size,
            overlap: self.overlap,
            next_start: Some(0),
        }
    }

    /// Chunks one lesson body, numbering chunks from `first_index`.
    pub fn chunk_lesson<'a>(
        &self,
        course_title: &'a str,
        lesson_number: Option<u32>,
        body: &'a str,
        first_index: usize,
    ) -> impl Iterator<Item = CourseChunk> + 'a {
        self.windows(body)
            .enumerate()
            .map(move |(offset, window)| CourseChunk {
                course_title: course_title.to_string(),
                lesson_number,
                chunk_index: first_index + offset,
                start_offset: window.start,
                content: window.text.to_string(),
            })
    }
}

pub struct Windows<'a> {
    text: &'a str,
    chars: Vec<(usize, char)>,
    size: usize,
    overlap: usize,
    next_start: Option<usize>,
}

impl<'a> Windows<'a> {
    fn byte_at(&self, char_pos: usize) -> usize {
        self.chars
            .get(char_pos)
            .map(|(byte, _)| *byte)
            .unwrap_or(self.text.len())
    }

    fn char_at(&self, char_pos: usize) -> char {
        self.chars[char_pos].1
    }

    /// Picks the end of a window that stops short of the text end.
    fn snap_end(&self, start: usize, hard_end: usize) -> usize {
        let floor = start + (self.overlap + 1).max(self.size / 2);

        let sentence_end = (floor..=hard_end).rev().find(|&pos| {
            let prev = self.char_at(pos - 1);
            prev == '\n' || (matches!(prev, '.' | '!' | '?') && self.char_at(pos).is_whitespace())
        });
        if let Some(pos) = sentence_end {
            return pos;
        }

        let word_end = (floor..=hard_end)
            .rev()
            .find(|&pos| self.char_at(pos).is_whitespace());
        word_end.unwrap_or(hard_end)
    }

    fn next_window_start(&self, end: usize) -> usize {
        let candidate = end - self.overlap;
        if candidate == 0 || self.char_at(candidate - 1).is_whitespace() {
            return candidate;
        }
        ((candidate + 1)..end)
            .find(|&pos| self.char_at(pos - 1).is_whitespace())
            .unwrap_or(candidate)
    }
}

impl<'a> Iterator for Windows<'a> {
    type Item = TextWindow<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_start?;
        let len = self.chars.len();
        if start >= len {
            self.next_start = None;
            return None;
        }

        let hard_end = (start + self.size).min(len);
        let end = if hard_end < len {
            self.snap_end(start, hard_end)
        } else {
            hard_end
        };

        let text = &self.text[self.byte_at(start)..self.byte_at(end)];
        self.next_start = if end >= len {
            None
        } else {
            Some(self.next_window_start(end))
        };

        Some(TextWindow { start, end, text })
    }
}

/// Rebuilds the source text from windows by dropping each window's overlap.
pub fn reassemble<'a>(windows: impl IntoIterator<Item = TextWindow<'a>>) -> String {
    let mut out = String::new();
    let mut covered = 0usize;
    for window in windows {
        let skip = covered.saturating_sub(window.start);
        out.extend(window.text.chars().skip(skip));
        covered = window.end;
    }
    out
}
