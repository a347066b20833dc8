use crate::{
    errors::{ToolError, ToolResult},
    models::{Tool, ToolCall},
    store::VectorStore,
};
use anyhow::Result;
use serde_json::json;

pub const RETRIEVE_CONTEXT: &str = "retrieve_context";

/// Something the model can call during a grading session.
pub trait ToolHandler {
    fn definition(&self) -> Tool;

    /// `Err` aborts the run; tool-level failures belong in the inner `ToolResult`
    /// so they can be shown to the model instead.
    fn call(&self, call: &ToolCall) -> Result<ToolResult<String>>;
}

/// Marking-scheme lookup exposed to the model as `retrieve_context`.
pub struct RetrievalTool<'a> {
    store: &'a VectorStore,
    k: usize,
}

impl<'a> RetrievalTool<'a> {
    pub fn new(store: &'a VectorStore, k: usize) -> Self {
        Self { store, k }
    }

    /// The `k` closest marking-scheme chunks as
    /// `Source: <metadata>\nContent: <text>`, separated by blank lines.
    pub fn retrieve(&self, query: &str) -> Result<String> {
        let docs = self.store.similarity_search(query, self.k)?;
        Ok(docs
            .iter()
            .map(|doc| {
                format!(
                    "Source: {}\nContent: {}",
                    serde_json::Value::Object(doc.metadata.clone()),
                    doc.text
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

impl ToolHandler for RetrievalTool<'_> {
    fn definition(&self) -> Tool {
        Tool::new(
            RETRIEVE_CONTEXT,
            "Retrieve relevant sections from the marking scheme based on a query",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What to look up in the marking scheme, e.g. a question number or topic"
                    }
                },
                "required": ["query"]
            }),
        )
    }

    fn call(&self, call: &ToolCall) -> Result<ToolResult<String>> {
        match call.str_arg("query") {
            Some(query) => Ok(Ok(self.retrieve(query)?)),
            None => Ok(Err(ToolError::InvalidParameters(format!(
                "{} requires a string argument 'query', got {}",
                RETRIEVE_CONTEXT, call.arguments
            )))),
        }
    }
}

/// The tools offered to the model, dispatched by name.
#[derive(Default)]
pub struct Toolbox<'a> {
    handlers: Vec<Box<dyn ToolHandler + 'a>>,
}

impl<'a> Toolbox<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, handler: impl ToolHandler + 'a) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    pub fn definitions(&self) -> Vec<Tool> {
        self.handlers.iter().map(|h| h.definition()).collect()
    }

    /// Run a call. Unknown names yield `ToolError::UnknownTool`, which renders
    /// as `Unknown tool: <name>`.
    pub fn dispatch(&self, call: &ToolCall) -> Result<ToolResult<String>> {
        match self
            .handlers
            .iter()
            .find(|h| h.definition().name == call.name)
        {
            Some(handler) => handler.call(call),
            None => Ok(Err(ToolError::UnknownTool(call.name.clone()))),
        }
    }
}
