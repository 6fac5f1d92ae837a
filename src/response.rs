//! Mapping from a complete wire response back to the internal model.
//!
//! Parsing a single bad tool call never fails the whole response: the call
//! degrades to a request with no arguments and an attached parse failure,
//! and the decision of what to do with it belongs to the caller.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::message::{Message, MessageContent, ToolRequest};
use crate::models::role::Role;

/// Token totals reported by the endpoint
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// Extract usage totals, falling back to the sum when the total is absent
pub fn parse_usage(data: &Value) -> Usage {
    let usage = match data.get("usage") {
        Some(usage) => usage,
        None => return Usage::default(),
    };

    let input_tokens = usage
        .get("prompt_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);

    let output_tokens = usage
        .get("completion_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);

    let total_tokens = usage
        .get("total_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32)
        .or_else(|| match (input_tokens, output_tokens) {
            (Some(input), Some(output)) => Some(input + output),
            _ => None,
        });

    Usage::new(input_tokens, output_tokens, total_tokens)
}

/// Build a tool request from one wire `tool_calls` entry, degrading bad
/// argument JSON to an attached parse failure
pub(crate) fn tool_call_to_request(id: String, name: String, raw_arguments: String) -> ToolRequest {
    // Empty argument strings show up for zero-parameter tools
    if raw_arguments.is_empty() {
        return ToolRequest::new(id, name, serde_json::json!({}));
    }
    match serde_json::from_str::<Value>(&raw_arguments) {
        Ok(arguments) => ToolRequest {
            id,
            name,
            arguments: Some(arguments),
            raw_arguments,
            parse_failure: None,
        },
        Err(e) => ToolRequest::parse_failed(
            id,
            name,
            raw_arguments,
            format!("Function call arguments were invalid JSON: {}", e),
        ),
    }
}

fn choice_to_message(choice: &Value) -> Message {
    let wire_message = &choice["message"];
    let mut content = Vec::new();

    if let Some(text) = wire_message.get("content").and_then(|v| v.as_str()) {
        content.push(MessageContent::text(text));
    }

    if let Some(tool_calls) = wire_message.get("tool_calls").and_then(|v| v.as_array()) {
        for tool_call in tool_calls {
            let id = tool_call["id"].as_str().unwrap_or_default().to_string();
            let name = tool_call["function"]["name"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            let arguments = tool_call["function"]["arguments"]
                .as_str()
                .unwrap_or_default()
                .to_string();

            content.push(MessageContent::ToolRequest(tool_call_to_request(
                id, name, arguments,
            )));
        }
    }

    Message {
        role: Role::Assistant,
        created: chrono::Utc::now().timestamp(),
        content,
    }
}

/// Convert a full wire response into messages, one per choice, preserving
/// the content order within each choice. A vendor error body is fatal.
pub fn parse_response(response: &Value) -> Result<(Vec<Message>, Usage)> {
    if let Some(error) = response.get("error") {
        return Err(anyhow!("Chat completion API error: {}", error));
    }

    let choices = response
        .get("choices")
        .and_then(|v| v.as_array())
        .ok_or_else(|| anyhow!("No choices in response"))?;

    let messages = choices.iter().map(choice_to_message).collect();
    let usage = parse_usage(response);

    Ok((messages, usage))
}
