mod common;

use std::fs;

use serde_json::json;

use common::{fixture_docs, post_json, send, spawn_app, ScriptedProvider};
use course_rag_backend::documents::chunker::reassemble;
use course_rag_backend::documents::{parse_course_file, Chunker, TextWindow};
use course_rag_backend::rag::SearchFilter;

#[tokio::test]
async fn startup_ingestion_indexes_fixture_course() {
    let app = spawn_app(&fixture_docs(), ScriptedProvider::new(Vec::new())).await;

    assert_eq!(app.store.course_count().await.unwrap(), 1);
    let course = app
        .store
        .get_course("Advanced Retrieval for AI with Chroma")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(course.instructor.as_deref(), Some("Anton Troynikov"));
    assert_eq!(course.lessons.len(), 2);
    assert_eq!(
        app.store
            .lesson_link("Advanced Retrieval for AI with Chroma", 1)
            .await
            .unwrap()
            .as_deref(),
        Some("https://example.com/retrieval/lesson1")
    );
}

#[tokio::test]
async fn reingesting_creates_no_duplicates() {
    let app = spawn_app(&fixture_docs(), ScriptedProvider::new(Vec::new())).await;
    let chunks_before = app.store.chunk_count().await.unwrap();
    assert!(chunks_before > 0);

    let (status, body) = send(&app.router, post_json("/api/ingest", json!({}))).await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "courses_added": 0, "chunks_added": 0 }));

    let (status, body) = send(
        &app.router,
        post_json("/api/ingest", json!({ "clear_existing": true })),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["courses_added"], 1);
    assert_eq!(body["chunks_added"], chunks_before);

    assert_eq!(app.store.course_count().await.unwrap(), 1);
    assert_eq!(app.store.chunk_count().await.unwrap(), chunks_before);

    let path = fixture_docs().join("retrieval_course.txt");
    app.state.rag.ingest_file(&path).await.unwrap();
    assert_eq!(app.store.course_count().await.unwrap(), 1);
    assert_eq!(app.store.chunk_count().await.unwrap(), chunks_before);
}

#[tokio::test]
async fn duplicate_titles_across_files_are_ingested_once() {
    let tmp = tempfile::tempdir().unwrap();
    let docs = tmp.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    let original = fs::read_to_string(fixture_docs().join("retrieval_course.txt")).unwrap();
    fs::write(docs.join("a.txt"), &original).unwrap();
    fs::write(docs.join("b.txt"), &original).unwrap();
    fs::write(docs.join("garbage.txt"), "this file has no header").unwrap();

    let app = spawn_app(&docs, ScriptedProvider::new(Vec::new())).await;
    assert_eq!(app.store.course_count().await.unwrap(), 1);
}

#[tokio::test]
async fn stored_chunks_reconstruct_each_lesson() {
    let app = spawn_app(&fixture_docs(), ScriptedProvider::new(Vec::new())).await;
    let parsed = parse_course_file(&fixture_docs().join("retrieval_course.txt")).unwrap();

    for (lesson, body) in &parsed.lesson_bodies {
        let filter = SearchFilter {
            course_title: Some(parsed.course.title.clone()),
            lesson_number: Some(lesson.lesson_number),
        };
        let mut hits = app.store.search("anything", 100, &filter).await.unwrap();
        hits.sort_by_key(|hit| hit.chunk.chunk_index);

        let windows: Vec<TextWindow> = hits
            .iter()
            .map(|hit| TextWindow {
                start: hit.chunk.start_offset,
                end: hit.chunk.start_offset + hit.chunk.content.chars().count(),
                text: hit.chunk.content.as_str(),
            })
            .collect();
        assert!(!windows.is_empty());
        assert_eq!(&reassemble(windows), body);
    }
}

#[tokio::test]
async fn partial_course_name_resolves_to_full_title() {
    let app = spawn_app(&fixture_docs(), ScriptedProvider::new(Vec::new())).await;

    assert_eq!(
        app.store.resolve_course_name("chroma").await.unwrap().as_deref(),
        Some("Advanced Retrieval for AI with Chroma")
    );
    assert_eq!(
        app.store
            .resolve_course_name("retrieval with chroma")
            .await
            .unwrap()
            .as_deref(),
        Some("Advanced Retrieval for AI with Chroma")
    );
}

#[test]
fn chunk_count_stays_near_formula_for_fixture_bodies() {
    let parsed = parse_course_file(&fixture_docs().join("retrieval_course.txt")).unwrap();
    let (size, overlap) = (200usize, 40usize);
    let chunker = Chunker::new(size, overlap).unwrap();

    for (_, body) in &parsed.lesson_bodies {
        let len = body.chars().count();
        let expected = if len <= size {
            1
        } else {
            (len - overlap + (size - overlap) - 1) / (size - overlap)
        };
        let actual = chunker.windows(body).count();
        assert!(
            actual >= expected && actual <= expected + 1,
            "expected about {} chunks, got {}",
            expected,
            actual
        );
    }
}
