//! Conversation types exchanged with the grading model.
//!
//! The orchestrator only ever talks to OpenAI-compatible chat endpoints, but
//! these structs stay independent of that wire format; `provider::wire`
//! converts in both directions.
pub mod message;
pub mod tool;

pub use message::{Message, MessageContent, RawToolCall, Role, ToolRequest, ToolResponse};
pub use tool::{Tool, ToolCall};
