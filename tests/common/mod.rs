#![allow(dead_code)]

use anyhow::Result;
use exam_grader::{
    engine::{Engine, PageImage, PdfInfo, ToolDiag},
    models::{Message, Tool, ToolCall},
    provider::{Provider, Usage},
    render::Presenter,
    report::Report,
};
use serde_json::json;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// Replays canned assistant turns in order and records every conversation
/// it was sent. Once the script runs out it answers with `fallback`.
pub struct ScriptedProvider {
    replies: RefCell<VecDeque<Message>>,
    fallback: String,
    pub seen: RefCell<Vec<Vec<Message>>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Message>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            fallback: "No questions found.".into(),
            seen: RefCell::new(Vec::new()),
        }
    }

    pub fn with_fallback(mut self, text: &str) -> Self {
        self.fallback = text.to_string();
        self
    }

    pub fn calls(&self) -> usize {
        self.seen.borrow().len()
    }
}

impl Provider for ScriptedProvider {
    fn complete(&self, messages: &[Message], _tools: &[Tool]) -> Result<(Message, Usage)> {
        self.seen.borrow_mut().push(messages.to_vec());
        let reply = self
            .replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Message::assistant().with_text(self.fallback.clone()));
        Ok((reply, Usage::default()))
    }
}

pub fn text(s: &str) -> Message {
    Message::assistant().with_text(s)
}

pub fn tool_call(id: &str, name: &str, query: &str) -> Message {
    Message::assistant().with_tool_request(id, Ok(ToolCall::new(name, json!({ "query": query }))))
}

/// Stands in for poppler: fixed page count, one tiny "image" per page, and
/// canned marking-scheme text.
pub struct FakeEngine {
    pub page_count: u32,
    pub scheme_pages: Vec<String>,
    pub extract_calls: Cell<usize>,
}

impl FakeEngine {
    pub fn new(page_count: u32) -> Self {
        Self {
            page_count,
            scheme_pages: vec![
                "Question 1: (b) carries 1 mark.\nQuestion 2: (d) carries 1 mark.".into(),
                "Question 3: Ohm's law V = IR, 2 marks.".into(),
            ],
            extract_calls: Cell::new(0),
        }
    }
}

impl Engine for FakeEngine {
    fn doctor(&self) -> Result<Vec<ToolDiag>> {
        Ok(vec![ToolDiag {
            tool: "fake".into(),
            ok: true,
            version: Some("0".into()),
            error: None,
        }])
    }

    fn pdf_info(&self, _input: &Path) -> Result<PdfInfo> {
        Ok(PdfInfo {
            page_count: self.page_count,
            title: None,
        })
    }

    fn render_pages(&self, _input: &Path, out_dir: &Path) -> Result<Vec<PageImage>> {
        assert!(out_dir.is_dir(), "work dir must exist before rendering");
        Ok((0..self.page_count as usize)
            .map(|index| PageImage {
                index,
                mime_type: "image/jpeg".into(),
                bytes: vec![index as u8, 0xff],
            })
            .collect())
    }

    fn extract_text(&self, _input: &Path) -> Result<Vec<String>> {
        self.extract_calls.set(self.extract_calls.get() + 1);
        Ok(self.scheme_pages.clone())
    }
}

/// Keeps every progress update for inspection.
#[derive(Default)]
pub struct RecordingPresenter {
    pub updates: Vec<(u8, String)>,
}

impl Presenter for RecordingPresenter {
    fn progress(&mut self, percent: u8, status: &str) {
        self.updates.push((percent, status.to_string()));
    }

    fn present(&mut self, _report: &Report) -> Result<Vec<PathBuf>> {
        Ok(Vec::new())
    }
}

/// Write a placeholder file; the fakes never parse it.
pub fn touch(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write fixture");
    path
}
