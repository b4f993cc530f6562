//! VectorStore trait: the course index seen by ingestion and the tools.
//!
//! Two collections share the course title as their only join key: the
//! catalog (one record per course) and the content (one record per chunk).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;
use crate::documents::{Course, CourseChunk};

/// Exact-match metadata filter applied before ranking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    pub course_title: Option<String>,
    pub lesson_number: Option<u32>,
}

/// Result of a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk: CourseChunk,
    /// Cosine similarity (higher = better).
    pub score: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Inserts or replaces the catalog record for `course.title`.
    async fn upsert_course_metadata(&self, course: &Course) -> Result<(), ApiError>;

    /// Replaces the content rows of every course present in `chunks`.
    async fn upsert_chunks(&self, chunks: &[CourseChunk]) -> Result<usize, ApiError>;

    /// Writes the catalog record and the full content set of one course in a
    /// single transaction. Content not in `chunks` is removed, even when
    /// `chunks` is empty. Nothing is written if embedding fails.
    async fn replace_course(&self, course: &Course, chunks: &[CourseChunk])
        -> Result<usize, ApiError>;

    /// Ranks content chunks against `query`. A `top_k` of 0 is treated as 1.
    async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<SearchHit>, ApiError>;

    /// Best catalog match for a possibly partial course name.
    async fn resolve_course_name(&self, name: &str) -> Result<Option<String>, ApiError>;

    async fn get_course(&self, title: &str) -> Result<Option<Course>, ApiError>;

    async fn lesson_link(&self, title: &str, lesson_number: u32)
        -> Result<Option<String>, ApiError>;

    /// Catalog titles in alphabetical order.
    async fn course_titles(&self) -> Result<Vec<String>, ApiError>;

    async fn course_count(&self) -> Result<usize, ApiError>;

    async fn chunk_count(&self) -> Result<usize, ApiError>;

    /// Drops every catalog and content record.
    async fn clear_all(&self) -> Result<(), ApiError>;
}
