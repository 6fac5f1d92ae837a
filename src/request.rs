//! Pure mapping from (history, settings, tools, tool choice) to the wire
//! request payload. No side effects live here; the connector decides which
//! tools and which choice to pass per round trip.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Value};

use crate::models::content::Content;
use crate::models::message::{Message, MessageContent};
use crate::models::tool::Tool;
use crate::settings::ExecutionSettings;

lazy_static! {
    static ref INVALID_NAME_CHARS: Regex = Regex::new(r"[^a-zA-Z0-9_-]").unwrap();
}

/// What the model is told about choosing a tool for this round trip.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolChoice {
    /// Let the model decide; the field is omitted from the payload
    Auto,
    /// Forbid tool calls for this round trip
    None,
    /// Force the named tool
    Required(String),
}

pub(crate) fn sanitize_tool_name(name: &str) -> String {
    INVALID_NAME_CHARS.replace_all(name, "_").to_string()
}

/// Convert one message into its wire representation. A single message can
/// expand into several wire messages: each tool response becomes its own
/// `tool`-role entry keyed by `tool_call_id`.
fn message_to_wire(message: &Message) -> Vec<Value> {
    let mut converted = json!({
        "role": message.role
    });
    let mut output = Vec::new();

    for content in &message.content {
        match content {
            MessageContent::Text(text) => {
                if !text.text.is_empty() {
                    converted["content"] = json!(text.text);
                }
            }
            MessageContent::Image(image) => {
                converted["content"] = json!([{
                    "type": "image_url",
                    "image_url": {
                        "url": format!("data:{};base64,{}", image.mime_type, image.data)
                    }
                }]);
            }
            MessageContent::ToolRequest(request) => {
                let tool_calls = converted
                    .as_object_mut()
                    .unwrap()
                    .entry("tool_calls")
                    .or_insert(json!([]));

                tool_calls.as_array_mut().unwrap().push(json!({
                    "id": request.id,
                    "type": "function",
                    "function": {
                        "name": sanitize_tool_name(&request.name),
                        "arguments": request.raw_arguments,
                    }
                }));
            }
            MessageContent::ToolResponse(response) => match &response.result {
                Ok(contents) => {
                    // Images are not accepted inside tool results; stand in
                    // with text so the id linkage stays intact.
                    let parts: Vec<Content> = contents
                        .iter()
                        .map(|content| match content {
                            Content::Image(_) => {
                                Content::text("The tool returned an image, which was omitted.")
                            }
                            other => other.clone(),
                        })
                        .collect();

                    output.push(json!({
                        "role": "tool",
                        "content": parts,
                        "tool_call_id": response.id
                    }));
                }
                Err(error) => {
                    // Shown as output so the model can react to the failure
                    output.push(json!({
                        "role": "tool",
                        "content": format!("The tool call failed with the following error:\n{}", error),
                        "tool_call_id": response.id
                    }));
                }
            },
        }
    }

    if converted.get("content").is_some() || converted.get("tool_calls").is_some() {
        output.insert(0, converted);
    }
    output
}

/// Convert the conversation history into the wire `messages` array
pub fn messages_to_wire(messages: &[Message]) -> Vec<Value> {
    messages.iter().flat_map(message_to_wire).collect()
}

/// Convert advertised tools into the wire `tools` array
pub fn tools_to_wire(tools: &[Tool]) -> anyhow::Result<Vec<Value>> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            anyhow::bail!("Duplicate tool name: {}", tool.name);
        }

        result.push(json!({
            "type": "function",
            "function": {
                "name": sanitize_tool_name(&tool.name),
                "description": tool.description,
                "parameters": tool.input_schema,
            }
        }));
    }

    Ok(result)
}

/// Build one chat completion request payload.
///
/// With no tools advertised, neither `tools` nor `tool_choice` appears in
/// the payload. Unset sampling knobs are omitted rather than defaulted.
pub fn build_request(
    model: &str,
    messages: &[Message],
    settings: &ExecutionSettings,
    tools: &[Tool],
    tool_choice: &ToolChoice,
    stream: bool,
) -> anyhow::Result<Value> {
    let mut payload = json!({
        "model": model,
        "messages": messages_to_wire(messages),
    });
    let body = payload.as_object_mut().unwrap();

    let tools_spec = tools_to_wire(tools)?;
    if !tools_spec.is_empty() {
        body.insert("tools".to_string(), json!(tools_spec));
        match tool_choice {
            ToolChoice::Auto => {}
            ToolChoice::None => {
                body.insert("tool_choice".to_string(), json!("none"));
            }
            ToolChoice::Required(name) => {
                body.insert(
                    "tool_choice".to_string(),
                    json!({
                        "type": "function",
                        "function": { "name": sanitize_tool_name(name) }
                    }),
                );
            }
        }
    }

    if let Some(temperature) = settings.temperature {
        body.insert("temperature".to_string(), json!(temperature));
    }
    if let Some(top_p) = settings.top_p {
        body.insert("top_p".to_string(), json!(top_p));
    }
    if let Some(max_tokens) = settings.max_tokens {
        body.insert("max_tokens".to_string(), json!(max_tokens));
    }
    if let Some(stop) = &settings.stop {
        body.insert("stop".to_string(), json!(stop));
    }
    if let Some(user) = &settings.user {
        body.insert("user".to_string(), json!(user));
    }
    if stream {
        body.insert("stream".to_string(), json!(true));
    }

    Ok(payload)
}
