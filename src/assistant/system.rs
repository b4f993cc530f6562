//! RagSystem wires parsing, chunking, the index, the tool loop and sessions.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::generator::AiGenerator;
use crate::core::config::{LlmSettings, RagSettings};
use crate::core::errors::ApiError;
use crate::documents::{
    parse_course_file, ChunkError, Chunker, Course, CourseChunk, ParsedCourse, Source,
};
use crate::history::SessionStore;
use crate::llm::LlmProvider;
use crate::rag::VectorStore;
use crate::tools::ToolManager;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub courses_added: usize,
    pub chunks_added: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseAnalytics {
    pub total_courses: usize,
    pub course_titles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryOutcome {
    pub answer: String,
    pub sources: Vec<Source>,
    pub session_id: String,
}

pub struct RagSystem {
    docs_dir: PathBuf,
    chunker: Chunker,
    store: Arc<dyn VectorStore>,
    tools: ToolManager,
    generator: AiGenerator,
    sessions: SessionStore,
}

impl RagSystem {
    pub fn new(
        rag: &RagSettings,
        llm: &LlmSettings,
        store: Arc<dyn VectorStore>,
        provider: Arc<dyn LlmProvider>,
    ) -> Result<Self, ChunkError> {
        let chunker = Chunker::new(rag.chunk_size, rag.chunk_overlap)?;

        Ok(Self {
            docs_dir: rag.docs_dir.clone(),
            chunker,
            tools: ToolManager::new(store.clone(), rag.max_results),
            generator: AiGenerator::new(provider, llm.temperature, llm.max_tokens, rag.max_tool_rounds),
            sessions: SessionStore::new(rag.max_history),
            store,
        })
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn docs_dir(&self) -> &Path {
        &self.docs_dir
    }

    /// Startup ingestion: loads every course in the documents directory that
    /// the index does not hold yet.
    pub async fn initialize(&self) -> Result<IngestReport, ApiError> {
        let report = self.ingest_directory(&self.docs_dir, false).await?;
        info!(
            "Course index ready: {} new course(s), {} new chunk(s)",
            report.courses_added, report.chunks_added
        );
        Ok(report)
    }

    /// Ingests every `*.txt` file in `dir`, in file name order.
    ///
    /// Without `clear_existing`, titles already in the catalog are skipped.
    /// With it, the index is emptied first and every course is rebuilt.
    pub async fn ingest_directory(
        &self,
        dir: &Path,
        clear_existing: bool,
    ) -> Result<IngestReport, ApiError> {
        if clear_existing {
            info!("Clearing course index before rebuild");
            self.store.clear_all().await?;
        }

        if !dir.is_dir() {
            warn!("Documents directory {} does not exist", dir.display());
            return Ok(IngestReport::default());
        }

        let mut existing = self.store.course_titles().await?;
        let mut report = IngestReport::default();

        for path in course_files(dir)? {
            let parsed = match parse_course_file(&path) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };

            if existing.contains(&parsed.course.title) {
                debug!("Course already indexed: {}", parsed.course.title);
                continue;
            }

            let chunks = self.store_course(&parsed).await?;
            info!(
                "Indexed course '{}' ({} lessons, {} chunks)",
                parsed.course.title,
                parsed.course.lessons.len(),
                chunks
            );
            existing.push(parsed.course.title.clone());
            report.courses_added += 1;
            report.chunks_added += chunks;
        }

        Ok(report)
    }

    /// Parses and stores one file, replacing any course with the same title.
    pub async fn ingest_file(&self, path: &Path) -> Result<(Course, usize), ApiError> {
        let parsed = parse_course_file(path).map_err(|e| ApiError::BadRequest(e.to_string()))?;
        let chunks = self.store_course(&parsed).await?;
        info!("Indexed course '{}' ({} chunks)", parsed.course.title, chunks);
        Ok((parsed.course, chunks))
    }

    async fn store_course(&self, parsed: &ParsedCourse) -> Result<usize, ApiError> {
        let chunks = self.build_chunks(parsed);
        self.store.replace_course(&parsed.course, &chunks).await
    }

    /// Chunks every lesson, numbering chunks across the whole course.
    pub fn build_chunks(&self, parsed: &ParsedCourse) -> Vec<CourseChunk> {
        let title = parsed.course.title.as_str();
        let mut chunks = Vec::new();

        for (lesson, body) in &parsed.lesson_bodies {
            let next_index = chunks.len();
            chunks.extend(self.chunker.chunk_lesson(
                title,
                Some(lesson.lesson_number),
                body,
                next_index,
            ));
        }

        chunks
    }

    /// Answers one query inside a session and records the exchange.
    pub async fn query(
        &self,
        query: &str,
        session_id: Option<&str>,
    ) -> Result<QueryOutcome, ApiError> {
        let session_id = self.sessions.get_or_create(session_id).await;
        let history = self.sessions.format_history(&session_id).await;

        let prompt = format!("Answer this question about course materials: {}", query);
        let generated = self
            .generator
            .generate(&prompt, history.as_deref(), &self.tools)
            .await?;

        self.sessions
            .add_exchange(&session_id, query, &generated.answer)
            .await;

        Ok(QueryOutcome {
            answer: generated.answer,
            sources: generated.sources,
            session_id,
        })
    }

    pub async fn course_analytics(&self) -> Result<CourseAnalytics, ApiError> {
        let course_titles = self.store.course_titles().await?;
        Ok(CourseAnalytics {
            total_courses: course_titles.len(),
            course_titles,
        })
    }
}

fn course_files(dir: &Path) -> Result<Vec<PathBuf>, ApiError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(ApiError::internal)? {
        let path = entry.map_err(ApiError::internal)?.path();
        if !path.is_file() {
            continue;
        }
        let is_txt = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("txt"))
            .unwrap_or(false);
        if is_txt {
            files.push(path);
        } else {
            debug!("Ignoring non-course file {}", path.display());
        }
    }
    files.sort();
    Ok(files)
}
