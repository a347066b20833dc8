mod common;

use common::{touch, FakeEngine};
use exam_grader::embedding::NgramEmbedder;
use exam_grader::indexer::Indexer;
use exam_grader::retrieval::RetrievalTool;
use exam_grader::splitter::RecursiveSplitter;
use exam_grader::store::VectorStore;
use std::path::Path;

fn open(dir: &Path) -> VectorStore {
    VectorStore::open(dir, "exam_sheet_evaluator", Box::new(NgramEmbedder::new(128).unwrap()))
        .unwrap()
}

#[test]
fn second_run_reuses_collection() {
    let tmp = tempfile::tempdir().unwrap();
    let scheme = touch(tmp.path(), "scheme.pdf", b"%PDF-1.4 scheme");
    let engine = FakeEngine::new(3);
    let splitter = RecursiveSplitter::new(1000, 200).unwrap();
    let indexer = Indexer::new(&engine, &splitter);

    let mut store = open(&tmp.path().join("db"));
    let first = indexer.index(&mut store, &scheme).unwrap();
    assert!(!first.skipped);
    assert_eq!(first.chunk_count, 2);

    let second = indexer.index(&mut store, &scheme).unwrap();
    assert!(second.skipped);
    assert_eq!(second.chunk_count, 2);
    assert_eq!(engine.extract_calls.get(), 1);
}

#[test]
fn persisted_collection_survives_reopen_even_if_scheme_changes() {
    let tmp = tempfile::tempdir().unwrap();
    let scheme = touch(tmp.path(), "scheme.pdf", b"%PDF-1.4 v1");
    let engine = FakeEngine::new(3);
    let splitter = RecursiveSplitter::new(1000, 200).unwrap();
    let db = tmp.path().join("db");

    {
        let mut store = open(&db);
        Indexer::new(&engine, &splitter).index(&mut store, &scheme).unwrap();
    }

    std::fs::write(&scheme, b"%PDF-1.4 v2").unwrap();
    let mut reopened = open(&db);
    assert_eq!(reopened.count(), 2);
    let outcome = Indexer::new(&engine, &splitter)
        .index(&mut reopened, &scheme)
        .unwrap();
    assert!(outcome.skipped);
    assert_eq!(engine.extract_calls.get(), 1);
}

#[test]
fn indexed_chunks_are_retrievable_with_page_metadata() {
    let tmp = tempfile::tempdir().unwrap();
    let scheme = touch(tmp.path(), "scheme.pdf", b"%PDF-1.4");
    let engine = FakeEngine::new(1);
    let splitter = RecursiveSplitter::new(1000, 200).unwrap();
    let mut store = open(&tmp.path().join("db"));
    Indexer::new(&engine, &splitter).index(&mut store, &scheme).unwrap();

    let out = RetrievalTool::new(&store, 1).retrieve("Ohm's law V = IR").unwrap();
    assert!(out.starts_with("Source: {"));
    assert!(out.contains("\"page\":1"));
    assert!(out.contains("\"start_index\":0"));
    assert!(out.contains("Content: Question 3: Ohm's law V = IR, 2 marks."));
}

#[test]
fn unreadable_scheme_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = FakeEngine::new(1);
    let splitter = RecursiveSplitter::new(1000, 200).unwrap();
    let mut store = open(&tmp.path().join("db"));
    let err = Indexer::new(&engine, &splitter)
        .index(&mut store, &tmp.path().join("missing.pdf"))
        .unwrap_err();
    assert!(format!("{err:#}").contains("reading marking scheme"));
    assert_eq!(store.count(), 0);
}
