mod common;

use common::{text, tool_call, touch, FakeEngine, RecordingPresenter, ScriptedProvider};
use exam_grader::config::Config;
use exam_grader::embedding::NgramEmbedder;
use exam_grader::models::MessageContent;
use exam_grader::pipeline::{DocumentPaths, Pipeline};
use exam_grader::report::ConsistencyStatus;
use exam_grader::scoring::Grade;
use exam_grader::store::VectorStore;
use std::path::Path;

struct Fixture {
    _tmp: tempfile::TempDir,
    cfg: Config,
    docs: DocumentPaths,
    store: VectorStore,
}

fn fixture() -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let mut cfg = Config::default();
    cfg.paths.work_dir = tmp.path().join("work").display().to_string();
    cfg.index.embedder = "ngram".into();

    let docs = DocumentPaths {
        marking_scheme: touch(tmp.path(), "Physics-MS.pdf", b"%PDF-1.4 scheme"),
        exam: touch(tmp.path(), "exam.pdf", b"%PDF-1.4 exam"),
    };
    let store = VectorStore::open(
        &tmp.path().join("db"),
        "exam_sheet_evaluator",
        Box::new(NgramEmbedder::new(128).unwrap()),
    )
    .unwrap();

    Fixture {
        _tmp: tmp,
        cfg,
        docs,
        store,
    }
}

fn work_dir_is_empty(path: &Path) -> bool {
    !path.exists() || std::fs::read_dir(path).unwrap().next().is_none()
}

#[test]
fn grades_every_section_and_aggregates() {
    let mut fx = fixture();
    let provider = ScriptedProvider::new(vec![
        tool_call("c1", "retrieve_context", "Question 1"),
        text("Question 1: 8/10"),
        text("Question 2: 3.5/5"),
        text("No answers found in this section."),
        text("No answers found in this section."),
    ]);
    let pipeline = Pipeline::new(&fx.cfg, FakeEngine::new(12), provider);
    let mut presenter = RecordingPresenter::default();

    let report = pipeline
        .run_report(&fx.docs, &mut fx.store, &mut presenter)
        .unwrap();

    assert_eq!(report.sections.len(), 4);
    assert_eq!(report.sections[0].content, "Question 1: 8/10");
    assert_eq!(report.sections[1].name, "Section B - Short Answer Questions");
    assert_eq!(report.total_obtained, 11.5);
    assert_eq!(report.total_possible, 15.0);
    assert_eq!(report.grade, Grade::BPlus);
    assert!(report.consistency.is_none());
    assert_eq!(fx.store.count(), 2);

    let percents: Vec<u8> = presenter.updates.iter().map(|(p, _)| *p).collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");
    assert!(percents.contains(&10));
    assert!(percents.contains(&20));
    assert!(percents.contains(&80));
    assert_eq!(
        presenter.updates.last().unwrap(),
        &(100, "Grading complete!".to_string())
    );

    assert!(work_dir_is_empty(Path::new(&fx.cfg.paths.work_dir)));
}

#[test]
fn sections_see_only_their_pages() {
    let mut fx = fixture();
    let provider = ScriptedProvider::new(Vec::new()).with_fallback("Question 1: 1/1");
    let pipeline = Pipeline::new(&fx.cfg, FakeEngine::new(12), &provider);

    let report = pipeline
        .run_report(&fx.docs, &mut fx.store, &mut RecordingPresenter::default())
        .unwrap();
    assert_eq!(report.questions_graded(), 4);

    let seen = provider.seen.borrow();
    let images_per_section: Vec<usize> = seen
        .iter()
        .map(|history| {
            history[0]
                .content
                .iter()
                .filter(|c| matches!(c, MessageContent::Image { .. }))
                .count()
        })
        .collect();
    assert_eq!(images_per_section, vec![10, 2, 0, 0]);
}

#[test]
fn consistency_check_regrades_first_section() {
    let mut fx = fixture();
    fx.cfg.grading.consistency_check = true;
    let provider = ScriptedProvider::new(vec![
        text("Question 1: 1/1\nQuestion 2: 1/1"),
        text("Question 3: 2/2"),
        text(""),
        text(""),
        text("Question 1: 1/1"),
    ]);
    let pipeline = Pipeline::new(&fx.cfg, FakeEngine::new(12), provider);

    let report = pipeline
        .run_report(&fx.docs, &mut fx.store, &mut RecordingPresenter::default())
        .unwrap();

    let check = report.consistency.expect("consistency result");
    assert_eq!(check.section, "Section A - Multiple Choice Questions");
    assert_eq!((check.original_count, check.rerun_count), (2, 1));
    assert_eq!(check.status, ConsistencyStatus::Warning);
    // the re-run does not change the totals
    assert_eq!(report.total_possible, 4.0);
}

#[test]
fn keeps_intermediates_when_asked() {
    let mut fx = fixture();
    fx.cfg.global.keep_intermediates = true;
    let provider = ScriptedProvider::new(Vec::new());
    let pipeline = Pipeline::new(&fx.cfg, FakeEngine::new(3), provider);

    let report = pipeline
        .run_report(&fx.docs, &mut fx.store, &mut RecordingPresenter::default())
        .unwrap();
    assert_eq!(report.grade, Grade::NotApplicable);
    assert_eq!(std::fs::read_dir(&fx.cfg.paths.work_dir).unwrap().count(), 1);
}

#[test]
fn rejects_bad_exam_inputs() {
    let mut fx = fixture();
    let pipeline = Pipeline::new(&fx.cfg, FakeEngine::new(3), ScriptedProvider::new(Vec::new()));

    let mut docs = fx.docs.clone();
    docs.exam = docs.exam.with_file_name("missing.pdf");
    let err = pipeline
        .run_report(&docs, &mut fx.store, &mut RecordingPresenter::default())
        .unwrap_err();
    assert!(err.to_string().contains("does not exist"));

    let mut docs = fx.docs.clone();
    docs.exam = touch(docs.exam.parent().unwrap(), "notes.txt", b"hello");
    let err = pipeline
        .run_report(&docs, &mut fx.store, &mut RecordingPresenter::default())
        .unwrap_err();
    assert!(err.to_string().contains("not a PDF"));

    let mut docs = fx.docs.clone();
    docs.exam = std::path::PathBuf::from("https://example.com/exam.pdf");
    let err = pipeline
        .run_report(&docs, &mut fx.store, &mut RecordingPresenter::default())
        .unwrap_err();
    assert!(err.to_string().contains("URL inputs are disabled"));
}

#[test]
fn page_limit_is_enforced() {
    let mut fx = fixture();
    fx.cfg.limits.max_input_pages = 5;
    let provider = ScriptedProvider::new(Vec::new());
    let pipeline = Pipeline::new(&fx.cfg, FakeEngine::new(6), provider);

    let err = pipeline
        .run_report(&fx.docs, &mut fx.store, &mut RecordingPresenter::default())
        .unwrap_err();
    assert!(err.to_string().contains("max_input_pages"));
    assert_eq!(fx.store.count(), 0);
}
