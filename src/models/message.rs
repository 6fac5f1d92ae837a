use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::content::Content;
use super::role::Role;
use crate::errors::ToolResult;

/// A request from the model to invoke one tool.
///
/// `name` is the fully qualified `{plugin}-{tool}` name as it appeared on
/// the wire. `raw_arguments` preserves the model's original argument string
/// so the request can be echoed back verbatim on resubmission. `arguments`
/// is `None` exactly when the argument string was not valid JSON, in which
/// case `parse_failure` describes the problem and the call is never run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub id: String,
    pub name: String,
    pub arguments: Option<Value>,
    pub raw_arguments: String,
    pub parse_failure: Option<String>,
}

impl ToolRequest {
    pub fn new<I: Into<String>, N: Into<String>>(id: I, name: N, arguments: Value) -> Self {
        let raw = arguments.to_string();
        Self {
            id: id.into(),
            name: name.into(),
            arguments: Some(arguments),
            raw_arguments: raw,
            parse_failure: None,
        }
    }

    /// A request whose argument string could not be parsed. The raw string
    /// is kept for the wire; the call itself will be skipped.
    pub fn parse_failed<I, N, R, F>(id: I, name: N, raw_arguments: R, failure: F) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        R: Into<String>,
        F: Into<String>,
    {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: None,
            raw_arguments: raw_arguments.into(),
            parse_failure: Some(failure.into()),
        }
    }
}

/// The outcome of one tool request, keyed back to it by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub id: String,
    pub result: ToolResult<Vec<Content>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Content carried by a message, either plain content or tool content
pub enum MessageContent {
    Text(super::content::TextContent),
    Image(super::content::ImageContent),
    ToolRequest(ToolRequest),
    ToolResponse(ToolResponse),
}

impl MessageContent {
    pub fn text<S: Into<String>>(text: S) -> Self {
        MessageContent::Text(super::content::TextContent { text: text.into() })
    }

    pub fn image<S: Into<String>, T: Into<String>>(data: S, mime_type: T) -> Self {
        MessageContent::Image(super::content::ImageContent {
            data: data.into(),
            mime_type: mime_type.into(),
        })
    }

    pub fn tool_request(request: ToolRequest) -> Self {
        MessageContent::ToolRequest(request)
    }

    pub fn tool_response<S: Into<String>>(id: S, result: ToolResult<Vec<Content>>) -> Self {
        MessageContent::ToolResponse(ToolResponse {
            id: id.into(),
            result,
        })
    }

    pub fn as_tool_request(&self) -> Option<&ToolRequest> {
        if let MessageContent::ToolRequest(ref request) = self {
            Some(request)
        } else {
            None
        }
    }

    pub fn as_tool_response(&self) -> Option<&ToolResponse> {
        if let MessageContent::ToolResponse(ref response) = self {
            Some(response)
        } else {
            None
        }
    }

    /// Get the text if this is a Text variant
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(&text.text),
            _ => None,
        }
    }
}

impl From<Content> for MessageContent {
    fn from(content: Content) -> Self {
        match content {
            Content::Text(text) => MessageContent::Text(text),
            Content::Image(image) => MessageContent::Image(image),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A message to or from the model
pub struct Message {
    pub role: Role,
    pub created: i64,
    pub content: Vec<MessageContent>,
}

impl Message {
    fn new(role: Role) -> Self {
        Message {
            role,
            created: Utc::now().timestamp(),
            content: Vec::new(),
        }
    }

    /// Create a new system message with the current timestamp
    pub fn system() -> Self {
        Self::new(Role::System)
    }

    /// Create a new user message with the current timestamp
    pub fn user() -> Self {
        Self::new(Role::User)
    }

    /// Create a new assistant message with the current timestamp
    pub fn assistant() -> Self {
        Self::new(Role::Assistant)
    }

    /// Create a new tool message with the current timestamp.
    /// Tool messages must carry only ToolResponse content.
    pub fn tool() -> Self {
        Self::new(Role::Tool)
    }

    /// Add any MessageContent to the message
    pub fn with_content(mut self, content: MessageContent) -> Self {
        self.content.push(content);
        self
    }

    /// Add text content to the message
    pub fn with_text<S: Into<String>>(self, text: S) -> Self {
        self.with_content(MessageContent::text(text))
    }

    /// Add image content to the message
    pub fn with_image<S: Into<String>, T: Into<String>>(self, data: S, mime_type: T) -> Self {
        self.with_content(MessageContent::image(data, mime_type))
    }

    /// Add a tool request to the message
    pub fn with_tool_request(self, request: ToolRequest) -> Self {
        self.with_content(MessageContent::ToolRequest(request))
    }

    /// Add a tool response to the message
    pub fn with_tool_response<S: Into<String>>(
        self,
        id: S,
        result: ToolResult<Vec<Content>>,
    ) -> Self {
        self.with_content(MessageContent::tool_response(id, result))
    }

    /// All tool requests carried by this message, in source order
    pub fn tool_requests(&self) -> Vec<&ToolRequest> {
        self.content
            .iter()
            .filter_map(|content| content.as_tool_request())
            .collect()
    }
}
