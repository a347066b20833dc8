//! Conversion between the internal conversation types and the OpenAI chat
//! completions wire format.
use anyhow::{anyhow, Result};
use regex::Regex;
use serde_json::{json, Value};
use std::sync::LazyLock;

use crate::errors::ToolError;
use crate::models::{Message, MessageContent, RawToolCall, Role, Tool, ToolCall};

static FUNCTION_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("valid function name regex"));

/// Convert messages to OpenAI's request format.
///
/// Tool responses become standalone `role: tool` messages following the turn
/// that carried them. A message with a single text part is sent as a plain
/// string; anything else as a content array.
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    let mut spec = Vec::new();

    for message in messages {
        let mut parts = Vec::new();
        let mut tool_calls = Vec::new();
        let mut tool_outputs = Vec::new();

        for content in &message.content {
            match content {
                MessageContent::Text { text } => {
                    if !text.is_empty() {
                        parts.push(json!({"type": "text", "text": text}));
                    }
                }
                MessageContent::Image { data, mime_type } => {
                    parts.push(json!({
                        "type": "image_url",
                        "image_url": {"url": format!("data:{};base64,{}", mime_type, data)}
                    }));
                }
                // Unparseable requests are replayed as sent so their error
                // reply still answers a call in this turn.
                MessageContent::ToolRequest(request) => {
                    let (name, arguments) = match (&request.tool_call, &request.raw) {
                        (Ok(call), _) => (call.name.clone(), call.arguments.to_string()),
                        (Err(_), Some(raw)) => (replay_name(&raw.name), raw.arguments.clone()),
                        (Err(_), None) => (UNKNOWN_FUNCTION.to_string(), "{}".to_string()),
                    };
                    tool_calls.push(json!({
                        "id": request.id,
                        "type": "function",
                        "function": {
                            "name": name,
                            "arguments": arguments,
                        }
                    }));
                }
                MessageContent::ToolResponse(response) => tool_outputs.push(json!({
                    "role": "tool",
                    "content": response.output,
                    "tool_call_id": response.id
                })),
            }
        }

        if !parts.is_empty() || !tool_calls.is_empty() {
            let mut converted = json!({ "role": message.role });
            if let [only] = parts.as_slice() {
                if only["type"] == "text" {
                    converted["content"] = only["text"].clone();
                } else {
                    converted["content"] = json!(parts);
                }
            } else if !parts.is_empty() {
                converted["content"] = json!(parts);
            } else {
                converted["content"] = Value::Null;
            }
            if !tool_calls.is_empty() {
                converted["tool_calls"] = json!(tool_calls);
            }
            spec.push(converted);
        }
        spec.extend(tool_outputs);
    }

    spec
}

pub fn tools_to_openai_spec(tools: &[Tool]) -> Result<Vec<Value>> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }

        result.push(json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.parameters,
            }
        }));
    }

    Ok(result)
}

/// Convert an OpenAI chat completion response to an assistant message.
///
/// `content` may be a string or an array of parts; text parts become text
/// content and any other part is kept as its JSON text.
pub fn openai_response_to_message(response: &Value) -> Result<Message> {
    let original = response
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| anyhow!("response has no choices[0].message: {}", response))?;

    let mut message = Message::assistant();

    match original.get("content") {
        Some(Value::String(text)) => {
            message = message.with_text(text.as_str());
        }
        Some(Value::Array(parts)) => {
            for part in parts {
                let text = match part.get("text").and_then(Value::as_str) {
                    Some(text) => text.to_string(),
                    None => part.to_string(),
                };
                message = message.with_text(text);
            }
        }
        _ => {}
    }

    if let Some(tool_calls) = original.get("tool_calls").and_then(Value::as_array) {
        for tool_call in tool_calls {
            let id = tool_call["id"].as_str().unwrap_or_default().to_string();
            let function_name = tool_call["function"]["name"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            let arguments = tool_call["function"]["arguments"]
                .as_str()
                .unwrap_or_default();

            let raw = RawToolCall {
                name: function_name.clone(),
                arguments: arguments.to_string(),
            };

            if !is_valid_function_name(&function_name) {
                let error = ToolError::UnknownTool(function_name);
                message = message.with_unparsed_tool_request(id, raw, error);
                continue;
            }

            let parsed = if arguments.trim().is_empty() {
                Ok(json!({}))
            } else {
                serde_json::from_str::<Value>(arguments)
            };
            match parsed {
                Ok(params) => {
                    message = message.with_tool_request(id, Ok(ToolCall::new(function_name, params)));
                }
                Err(e) => {
                    let error = ToolError::InvalidParameters(format!(
                        "could not interpret tool arguments for call {}: {}",
                        id, e
                    ));
                    message = message.with_unparsed_tool_request(id, raw, error);
                }
            }
        }
    }

    debug_assert_eq!(message.role, Role::Assistant);
    Ok(message)
}

fn is_valid_function_name(name: &str) -> bool {
    FUNCTION_NAME.is_match(name)
}

const UNKNOWN_FUNCTION: &str = "unknown_tool";

/// Endpoints validate replayed function names, so characters outside the
/// allowed set are replaced with `_`.
fn replay_name(name: &str) -> String {
    if is_valid_function_name(name) {
        return name.to_string();
    }
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        UNKNOWN_FUNCTION.to_string()
    } else {
        cleaned
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Context length exceeded. Message: {0}")]
pub struct ContextLengthExceededError(String);

pub fn check_openai_context_length_error(error: &Value) -> Option<ContextLengthExceededError> {
    let code = error.get("code")?.as_str()?;
    if code == "context_length_exceeded" || code == "string_above_max_length" {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        Some(ContextLengthExceededError(message))
    } else {
        None
    }
}
