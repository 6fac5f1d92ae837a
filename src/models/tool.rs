use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool a plugin exposes to the model.
///
/// `name` is the plugin-local name; on the wire tools are advertised under
/// the qualified form `{plugin}-{name}` so the connector can route the
/// model's calls back to the owning plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// The name of the tool
    pub name: String,
    /// A description of what the tool does
    pub description: String,
    /// A JSON schema of the tool's input parameters
    pub input_schema: Value,
}

impl Tool {
    pub fn new<N: Into<String>, D: Into<String>>(name: N, description: D, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// A request from the model to run a tool, with parsed arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// The plugin-local name of the tool
    pub name: String,
    /// The parameters for the call
    pub arguments: Value,
}

impl ToolCall {
    pub fn new<S: Into<String>>(name: S, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Join a plugin name and a tool name into the wire-facing form.
pub fn qualify_name(plugin: &str, tool: &str) -> String {
    format!("{}-{}", plugin, tool)
}

/// Split a qualified name back into (plugin, tool) at the first separator.
pub fn split_qualified_name(qualified: &str) -> Option<(&str, &str)> {
    qualified.split_once('-')
}
