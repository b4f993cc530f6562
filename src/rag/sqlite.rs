//! SQLite-backed course index.
//!
//! Metadata and chunks live in SQLite; similarity is brute-force cosine over
//! embeddings stored as little-endian `f32` blobs.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::debug;

use super::embedding::{cosine_similarity, Embedder};
use super::store::{SearchFilter, SearchHit, VectorStore};
use crate::core::errors::ApiError;
use crate::documents::{Course, CourseChunk, Lesson};

pub struct SqliteVectorStore {
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
}

impl SqliteVectorStore {
    pub async fn open(db_path: PathBuf, embedder: Arc<dyn Embedder>) -> Result<Self, ApiError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(ApiError::index)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ApiError::index)?;

        debug!("Opened course index at {}", db_path.display());
        let store = Self { pool, embedder };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS course_catalog (
                title TEXT PRIMARY KEY,
                instructor TEXT,
                course_link TEXT,
                lessons TEXT NOT NULL DEFAULT '[]',
                embedding BLOB,
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::index)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS course_content (
                chunk_id TEXT PRIMARY KEY,
                course_title TEXT NOT NULL,
                lesson_number INTEGER,
                chunk_index INTEGER NOT NULL,
                start_offset INTEGER NOT NULL DEFAULT 0,
                content TEXT NOT NULL,
                embedding BLOB
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::index)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_content_course
             ON course_content(course_title, lesson_number)",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::index)?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    async fn embed_chunks(&self, chunks: &[CourseChunk]) -> Result<Vec<Vec<f32>>, ApiError> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        let texts: Vec<String> = chunks.iter().map(CourseChunk::embedding_text).collect();
        let embeddings = self.embedder.embed(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(ApiError::Upstream(format!(
                "embedder returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }
        Ok(embeddings)
    }

    async fn write_catalog(
        conn: &mut SqliteConnection,
        course: &Course,
        title_embedding: &[f32],
    ) -> Result<(), ApiError> {
        let lessons = serde_json::to_string(&course.lessons).map_err(ApiError::internal)?;

        sqlx::query(
            "INSERT OR REPLACE INTO course_catalog (title, instructor, course_link, lessons, embedding, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))",
        )
        .bind(&course.title)
        .bind(&course.instructor)
        .bind(&course.course_link)
        .bind(&lessons)
        .bind(Self::serialize_embedding(title_embedding))
        .execute(&mut *conn)
        .await
        .map_err(ApiError::index)?;

        Ok(())
    }

    async fn delete_content(conn: &mut SqliteConnection, title: &str) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM course_content WHERE course_title = ?1")
            .bind(title)
            .execute(&mut *conn)
            .await
            .map_err(ApiError::index)?;
        Ok(())
    }

    async fn insert_content(
        conn: &mut SqliteConnection,
        chunks: &[CourseChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), ApiError> {
        for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
            sqlx::query(
                "INSERT OR REPLACE INTO course_content
                    (chunk_id, course_title, lesson_number, chunk_index, start_offset, content, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .bind(chunk.chunk_id())
            .bind(&chunk.course_title)
            .bind(chunk.lesson_number.map(i64::from))
            .bind(chunk.chunk_index as i64)
            .bind(chunk.start_offset as i64)
            .bind(&chunk.content)
            .bind(Self::serialize_embedding(embedding))
            .execute(&mut *conn)
            .await
            .map_err(ApiError::index)?;
        }
        Ok(())
    }

    fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> CourseChunk {
        let lesson_number: Option<i64> = row.get("lesson_number");
        let chunk_index: i64 = row.get("chunk_index");
        let start_offset: i64 = row.get("start_offset");

        CourseChunk {
            course_title: row.get("course_title"),
            lesson_number: lesson_number.map(|n| n as u32),
            chunk_index: chunk_index as usize,
            start_offset: start_offset as usize,
            content: row.get("content"),
        }
    }

    fn row_to_course(row: &sqlx::sqlite::SqliteRow) -> Course {
        let lessons_json: String = row.get("lessons");
        let lessons = serde_json::from_str::<Vec<Lesson>>(&lessons_json).unwrap_or_default();

        Course {
            title: row.get("title"),
            course_link: row.get("course_link"),
            instructor: row.get("instructor"),
            lessons,
        }
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert_course_metadata(&self, course: &Course) -> Result<(), ApiError> {
        let embedding = self.embedder.embed_one(&course.title).await?;
        let mut conn = self.pool.acquire().await.map_err(ApiError::index)?;
        Self::write_catalog(&mut *conn, course, &embedding).await
    }

    async fn upsert_chunks(&self, chunks: &[CourseChunk]) -> Result<usize, ApiError> {
        let embeddings = self.embed_chunks(chunks).await?;
        let courses: BTreeSet<&str> = chunks.iter().map(|c| c.course_title.as_str()).collect();

        let mut tx = self.pool.begin().await.map_err(ApiError::index)?;
        for title in courses {
            Self::delete_content(&mut *tx, title).await?;
        }
        Self::insert_content(&mut *tx, chunks, &embeddings).await?;
        tx.commit().await.map_err(ApiError::index)?;

        Ok(chunks.len())
    }

    async fn replace_course(
        &self,
        course: &Course,
        chunks: &[CourseChunk],
    ) -> Result<usize, ApiError> {
        if let Some(stray) = chunks.iter().find(|c| c.course_title != course.title) {
            return Err(ApiError::internal(format!(
                "chunk '{}' does not belong to course '{}'",
                stray.chunk_id(),
                course.title
            )));
        }

        let title_embedding = self.embedder.embed_one(&course.title).await?;
        let embeddings = self.embed_chunks(chunks).await?;

        let mut tx = self.pool.begin().await.map_err(ApiError::index)?;
        Self::write_catalog(&mut *tx, course, &title_embedding).await?;
        Self::delete_content(&mut *tx, &course.title).await?;
        Self::insert_content(&mut *tx, chunks, &embeddings).await?;
        tx.commit().await.map_err(ApiError::index)?;

        debug!("Replaced course '{}' with {} chunk(s)", course.title, chunks.len());
        Ok(chunks.len())
    }

    async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<SearchHit>, ApiError> {
        let rows = sqlx::query(
            "SELECT course_title, lesson_number, chunk_index, start_offset, content, embedding
             FROM course_content
             WHERE (?1 IS NULL OR course_title = ?1)
               AND (?2 IS NULL OR lesson_number = ?2)",
        )
        .bind(filter.course_title.as_deref())
        .bind(filter.lesson_number.map(i64::from))
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::index)?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed_one(query).await?;

        let mut scored: Vec<SearchHit> = rows
            .iter()
            .filter_map(|row| {
                let embedding_bytes: Vec<u8> = row.get("embedding");
                if embedding_bytes.is_empty() {
                    return None;
                }
                let stored = Self::deserialize_embedding(&embedding_bytes);

                Some(SearchHit {
                    chunk: Self::row_to_chunk(row),
                    score: cosine_similarity(&query_embedding, &stored),
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
        });
        scored.truncate(top_k.max(1));

        debug!(
            "Index search returned {} hit(s) (course={:?}, lesson={:?})",
            scored.len(),
            filter.course_title,
            filter.lesson_number
        );
        Ok(scored)
    }

    /// Exact (case-insensitive) title first, then the closest title. Only an
    /// empty catalog or a blank name resolves to `None`.
    async fn resolve_course_name(&self, name: &str) -> Result<Option<String>, ApiError> {
        let needle = name.trim();
        if needle.is_empty() {
            return Ok(None);
        }

        let rows = sqlx::query("SELECT title, embedding FROM course_catalog")
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::index)?;
        if rows.is_empty() {
            return Ok(None);
        }

        let titles: Vec<String> = rows.iter().map(|row| row.get("title")).collect();
        let lowered = needle.to_lowercase();

        if let Some(exact) = titles.iter().find(|t| t.to_lowercase() == lowered) {
            return Ok(Some(exact.clone()));
        }

        let query_embedding = self.embedder.embed_one(needle).await?;
        let best = rows
            .iter()
            .zip(titles.iter())
            .map(|(row, title)| {
                let bytes: Vec<u8> = row.get("embedding");
                let score = cosine_similarity(&query_embedding, &Self::deserialize_embedding(&bytes));
                let substring = title.to_lowercase().contains(&lowered);
                // A substring hit outranks any pure vector match.
                let rank = if substring { score + 1.0 } else { score };
                (rank, title)
            })
            .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

        Ok(best.map(|(_, title)| title.clone()))
    }

    async fn get_course(&self, title: &str) -> Result<Option<Course>, ApiError> {
        let row = sqlx::query(
            "SELECT title, instructor, course_link, lessons
             FROM course_catalog
             WHERE title = ?1",
        )
        .bind(title)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::index)?;

        Ok(row.as_ref().map(Self::row_to_course))
    }

    async fn lesson_link(
        &self,
        title: &str,
        lesson_number: u32,
    ) -> Result<Option<String>, ApiError> {
        Ok(self
            .get_course(title)
            .await?
            .and_then(|course| course.lesson(lesson_number).and_then(|l| l.lesson_link.clone())))
    }

    async fn course_titles(&self) -> Result<Vec<String>, ApiError> {
        sqlx::query_scalar("SELECT title FROM course_catalog ORDER BY title")
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::index)
    }

    async fn course_count(&self) -> Result<usize, ApiError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM course_catalog")
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::index)?;
        Ok(count as usize)
    }

    async fn chunk_count(&self) -> Result<usize, ApiError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM course_content")
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::index)?;
        Ok(count as usize)
    }

    async fn clear_all(&self) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await.map_err(ApiError::index)?;
        sqlx::query("DELETE FROM course_content")
            .execute(&mut *tx)
            .await
            .map_err(ApiError::index)?;
        sqlx::query("DELETE FROM course_catalog")
            .execute(&mut *tx)
            .await
            .map_err(ApiError::index)?;
        tx.commit().await.map_err(ApiError::index)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::embedding::HashEmbedder;
    use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

    async fn test_store(dir: &tempfile::TempDir) -> SqliteVectorStore {
        SqliteVectorStore::open(
            dir.path().join("index.db"),
            Arc::new(HashEmbedder::new(128)),
        )
        .await
        .unwrap()
    }

    fn course(title: &str, lessons: &[(u32, Option<&str>)]) -> Course {
        Course {
            title: title.to_string(),
            course_link: Some(format!("https://example.com/{}", title.len())),
            instructor: Some("Ada".to_string()),
            lessons: lessons
                .iter()
                .map(|(n, link)| Lesson {
                    lesson_number: *n,
                    title: format!("Lesson {}", n),
                    lesson_link: link.map(str::to_string),
                })
                .collect(),
        }
    }

    fn chunk(title: &str, lesson: u32, index: usize, content: &str) -> CourseChunk {
        CourseChunk {
            course_title: title.to_string(),
            lesson_number: Some(lesson),
            chunk_index: index,
            start_offset: 0,
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn upsert_and_search_with_filters() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(&tmp).await;

        store
            .upsert_course_metadata(&course("Rust Basics", &[(1, None), (2, None)]))
            .await
            .unwrap();
        store
            .upsert_chunks(&[
                chunk("Rust Basics", 1, 0, "ownership and borrowing rules"),
                chunk("Rust Basics", 2, 1, "traits and generics explained"),
            ])
            .await
            .unwrap();

        let hits = store
            .search("ownership borrowing", 5, &SearchFilter::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.lesson_number, Some(1));
        assert!(hits[0].score > hits[1].score);

        let filter = SearchFilter {
            course_title: Some("Rust Basics".to_string()),
            lesson_number: Some(2),
        };
        let hits = store.search("ownership borrowing", 5, &filter).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.content, "traits and generics explained");
    }

    #[tokio::test]
    async fn reingesting_replaces_instead_of_duplicating() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(&tmp).await;
        let meta = course("Dup Course", &[(0, None)]);

        for _ in 0..2 {
            store.upsert_course_metadata(&meta).await.unwrap();
            store
                .upsert_chunks(&[
                    chunk("Dup Course", 0, 0, "first"),
                    chunk("Dup Course", 0, 1, "second"),
                ])
                .await
                .unwrap();
        }
        assert_eq!(store.course_count().await.unwrap(), 1);
        assert_eq!(store.chunk_count().await.unwrap(), 2);

        store
            .upsert_chunks(&[chunk("Dup Course", 0, 0, "only one now")])
            .await
            .unwrap();
        assert_eq!(store.chunk_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn replacing_with_no_chunks_clears_old_content() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(&tmp).await;
        let meta = course("Stale", &[(1, None)]);

        store
            .replace_course(&meta, &[chunk("Stale", 1, 0, "old body text")])
            .await
            .unwrap();
        assert_eq!(store.chunk_count().await.unwrap(), 1);

        let written = store.replace_course(&meta, &[]).await.unwrap();
        assert_eq!(written, 0);
        assert_eq!(store.chunk_count().await.unwrap(), 0);
        assert_eq!(store.course_count().await.unwrap(), 1);
        assert!(store
            .search("old body", 5, &SearchFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    /// Embeds single inputs, fails batches once `fail_batches` is set.
    struct BatchFailingEmbedder {
        inner: HashEmbedder,
        fail_batches: AtomicBool,
    }

    #[async_trait]
    impl Embedder for BatchFailingEmbedder {
        fn name(&self) -> &str {
            "batch-failing"
        }

        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
            if inputs.len() > 1 && self.fail_batches.load(AtomicOrdering::SeqCst) {
                return Err(ApiError::Upstream("embedding service down".to_string()));
            }
            self.inner.embed(inputs).await
        }
    }

    #[tokio::test]
    async fn failed_embedding_leaves_course_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let embedder = Arc::new(BatchFailingEmbedder {
            inner: HashEmbedder::new(64),
            fail_batches: AtomicBool::new(false),
        });
        let store = SqliteVectorStore::open(tmp.path().join("index.db"), embedder.clone())
            .await
            .unwrap();

        store
            .replace_course(
                &course("Flaky", &[(1, None)]),
                &[chunk("Flaky", 1, 0, "first"), chunk("Flaky", 1, 1, "second")],
            )
            .await
            .unwrap();

        embedder.fail_batches.store(true, AtomicOrdering::SeqCst);
        let err = store
            .replace_course(
                &course("Flaky", &[(2, None), (3, None)]),
                &[chunk("Flaky", 2, 0, "new two"), chunk("Flaky", 3, 1, "new three")],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Upstream(_)));

        let stored = store.get_course("Flaky").await.unwrap().unwrap();
        let lessons: Vec<u32> = stored.lessons.iter().map(|l| l.lesson_number).collect();
        assert_eq!(lessons, vec![1]);

        embedder.fail_batches.store(false, AtomicOrdering::SeqCst);
        let hits = store.search("first", 5, &SearchFilter::default()).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|hit| hit.chunk.lesson_number == Some(1)));
    }

    #[tokio::test]
    async fn replace_rejects_chunks_of_another_course() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(&tmp).await;

        let err = store
            .replace_course(&course("Mine", &[]), &[chunk("Theirs", 1, 0, "x")])
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));
        assert_eq!(store.course_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn top_k_zero_returns_one_hit() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(&tmp).await;
        store
            .upsert_chunks(&[chunk("C", 1, 0, "alpha"), chunk("C", 1, 1, "beta")])
            .await
            .unwrap();

        let hits = store.search("alpha", 0, &SearchFilter::default()).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn resolves_partial_course_names() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(&tmp).await;
        assert_eq!(store.resolve_course_name("MCP").await.unwrap(), None);

        store
            .upsert_course_metadata(&course("MCP: Build Rich-Context AI Apps", &[]))
            .await
            .unwrap();
        store
            .upsert_course_metadata(&course("Advanced Retrieval for AI with Chroma", &[]))
            .await
            .unwrap();

        assert_eq!(
            store.resolve_course_name("mcp").await.unwrap().as_deref(),
            Some("MCP: Build Rich-Context AI Apps")
        );
        assert_eq!(
            store.resolve_course_name("retrieval chroma").await.unwrap().as_deref(),
            Some("Advanced Retrieval for AI with Chroma")
        );
        assert!(store
            .resolve_course_name("Quantum Basket Weaving")
            .await
            .unwrap()
            .is_some());
        assert_eq!(store.resolve_course_name("   ").await.unwrap(), None);
    }

    #[tokio::test]
    async fn catalog_reads_and_clear() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(&tmp).await;

        store
            .upsert_course_metadata(&course("Zeta", &[(1, Some("https://z/1"))]))
            .await
            .unwrap();
        store
            .upsert_course_metadata(&course("Alpha", &[]))
            .await
            .unwrap();

        assert_eq!(store.course_titles().await.unwrap(), vec!["Alpha", "Zeta"]);
        assert_eq!(
            store.lesson_link("Zeta", 1).await.unwrap().as_deref(),
            Some("https://z/1")
        );
        assert_eq!(store.lesson_link("Zeta", 9).await.unwrap(), None);
        let zeta = store.get_course("Zeta").await.unwrap().unwrap();
        assert_eq!(zeta.instructor.as_deref(), Some("Ada"));
        assert_eq!(zeta.lessons.len(), 1);

        store.clear_all().await.unwrap();
        assert_eq!(store.course_count().await.unwrap(), 0);
        assert!(store.get_course("Zeta").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn index_persists_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let store = test_store(&tmp).await;
            store
                .upsert_course_metadata(&course("Persistent", &[]))
                .await
                .unwrap();
        }
        let reopened = test_store(&tmp).await;
        assert_eq!(reopened.course_titles().await.unwrap(), vec!["Persistent"]);
    }
}
