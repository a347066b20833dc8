use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures of a single tool call. These never abort a grading session; they
/// are rendered with `Display` and handed back to the model as the tool output.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}

pub type ToolResult<T> = Result<T, ToolError>;
