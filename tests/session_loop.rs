mod common;

use common::{text, tool_call, ScriptedProvider};
use exam_grader::embedding::NgramEmbedder;
use exam_grader::engine::PageImage;
use exam_grader::errors::ToolError;
use exam_grader::models::{Message, MessageContent};
use exam_grader::retrieval::{RetrievalTool, Toolbox};
use exam_grader::sections::Section;
use exam_grader::session::SessionRunner;
use exam_grader::store::{Document, VectorStore};
use serde_json::json;

fn store(dir: &std::path::Path) -> VectorStore {
    let mut store =
        VectorStore::open(dir, "session", Box::new(NgramEmbedder::new(128).unwrap())).unwrap();
    store
        .add_documents(
            vec![
                Document::new("Question 1: answer (c), 1 mark").with_metadata("page", json!(0)),
                Document::new("Question 2: answer (a), 1 mark").with_metadata("page", json!(0)),
            ],
            None,
        )
        .unwrap();
    store
}

fn section(start: usize, end: usize) -> Section {
    Section {
        name: "Section A - Multiple Choice Questions".into(),
        description: "Grade all MCQ questions.".into(),
        start_page: start,
        end_page: end,
    }
}

fn pages(n: usize) -> Vec<PageImage> {
    (0..n)
        .map(|index| PageImage {
            index,
            mime_type: "image/jpeg".into(),
            bytes: vec![index as u8],
        })
        .collect()
}

/// Tool responses in the last conversation the provider saw, as (id, output).
fn last_tool_outputs(provider: &ScriptedProvider) -> Vec<(String, String)> {
    let seen = provider.seen.borrow();
    let history = seen.last().unwrap();
    history
        .last()
        .unwrap()
        .content
        .iter()
        .filter_map(MessageContent::as_tool_response)
        .map(|r| (r.id.clone(), r.output.clone()))
        .collect()
}

#[test]
fn retrieval_results_are_fed_back_by_call_id() {
    let tmp = tempfile::tempdir().unwrap();
    let store = store(tmp.path());
    let toolbox = Toolbox::new().with(RetrievalTool::new(&store, 1));
    let provider = ScriptedProvider::new(vec![
        tool_call("call_a", "retrieve_context", "Question 2 answer"),
        text("Question 1: 1/1\nQuestion 2: 0/1"),
    ]);
    let runner = SessionRunner::new(&provider, &toolbox, "persona", 10);

    let result = runner.run_section(&section(0, 2), &pages(2)).unwrap();
    assert_eq!(result.name, "Section A - Multiple Choice Questions");
    assert_eq!(result.content, "Question 1: 1/1\nQuestion 2: 0/1");
    assert_eq!(provider.calls(), 2);

    let outputs = last_tool_outputs(&provider);
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].0, "call_a");
    assert!(outputs[0].1.starts_with("Source: {\"page\":0}\nContent: Question 2"));
}

#[test]
fn unknown_and_invalid_calls_become_error_text() {
    let tmp = tempfile::tempdir().unwrap();
    let store = store(tmp.path());
    let toolbox = Toolbox::new().with(RetrievalTool::new(&store, 1));
    let mixed = Message::assistant()
        .with_tool_request("u1", Ok(exam_grader::models::ToolCall::new("get_weather", json!({}))))
        .with_tool_request("u2", Err(ToolError::InvalidParameters("bad json".into())))
        .with_tool_request(
            "u3",
            Ok(exam_grader::models::ToolCall::new("retrieve_context", json!({"q": "x"}))),
        );
    let provider = ScriptedProvider::new(vec![mixed, text("done")]);
    let runner = SessionRunner::new(&provider, &toolbox, "persona", 10);

    runner.run_section(&section(0, 1), &pages(1)).unwrap();

    let outputs = last_tool_outputs(&provider);
    let ids: Vec<&str> = outputs.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, vec!["u1", "u2", "u3"]);
    assert_eq!(outputs[0].1, "Unknown tool: get_weather");
    assert_eq!(outputs[1].1, "Invalid parameters: bad json");
    assert!(outputs[2].1.starts_with("Invalid parameters:"));
}

#[test]
fn tool_rounds_are_capped() {
    let tmp = tempfile::tempdir().unwrap();
    let store = store(tmp.path());
    let toolbox = Toolbox::new().with(RetrievalTool::new(&store, 1));
    let endless: Vec<Message> = (0..30)
        .map(|i| tool_call(&format!("c{i}"), "retrieve_context", "Question 1"))
        .collect();
    let provider = ScriptedProvider::new(endless);
    let runner = SessionRunner::new(&provider, &toolbox, "persona", 10);

    let result = runner.run_section(&section(0, 1), &pages(1)).unwrap();
    // the initial call plus one per tool round
    assert_eq!(provider.calls(), 11);
    assert_eq!(result.content, "");
}

#[test]
fn pages_outside_the_section_are_never_sent() {
    let tmp = tempfile::tempdir().unwrap();
    let store = store(tmp.path());
    let toolbox = Toolbox::new().with(RetrievalTool::new(&store, 1));
    let provider = ScriptedProvider::new(vec![text("Question 11: 2/2")]);
    let runner = SessionRunner::new(&provider, &toolbox, "persona", 10);

    runner.run_section(&section(10, 12), &pages(15)).unwrap();

    let seen = provider.seen.borrow();
    let opening = &seen[0][0];
    let images = opening
        .content
        .iter()
        .filter(|c| matches!(c, MessageContent::Image { .. }))
        .count();
    assert_eq!(images, 2);
    let prompt = opening.content[0].as_text().unwrap();
    assert!(prompt.contains("SECTION TO GRADE: Section A - Multiple Choice Questions"));
    assert!(prompt.starts_with("\npersona\n"));
}

#[test]
fn empty_section_is_graded_from_prompt_alone() {
    let tmp = tempfile::tempdir().unwrap();
    let store = store(tmp.path());
    let toolbox = Toolbox::new().with(RetrievalTool::new(&store, 1));
    let provider = ScriptedProvider::new(vec![text("No answers on these pages.")]);
    let runner = SessionRunner::new(&provider, &toolbox, "persona", 10);

    let result = runner.run_section(&section(4, 4), &pages(4)).unwrap();
    assert_eq!(result.content, "No answers on these pages.");
    assert_eq!(provider.seen.borrow()[0][0].content.len(), 1);
}
