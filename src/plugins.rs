use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::errors::{ToolError, ToolResult};
use crate::models::content::Content;
use crate::models::message::ToolRequest;
use crate::models::tool::{qualify_name, split_qualified_name, Tool, ToolCall};

/// A named collection of tools the model may call.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// The plugin's name, used as the prefix of qualified tool names
    fn name(&self) -> &str;

    /// The tools this plugin exposes
    fn tools(&self) -> &[Tool];

    /// Run one tool call. Failures are returned, not panicked; an `Err`
    /// becomes the call's result value and never aborts the exchange.
    async fn call(&self, tool_call: ToolCall) -> ToolResult<Vec<Content>>;
}

/// Resolves the model's qualified tool requests to plugins and runs them.
///
/// Every dispatch outcome is a value: parse failures and unknown tools
/// produce error results without invoking anything, and plugin failures are
/// captured at the invocation boundary. The invocation counter only counts
/// calls that actually reached a plugin.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Box<dyn Plugin>>,
    invocations: AtomicUsize,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_plugin(&mut self, plugin: Box<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    /// How many tool calls have actually been run through this registry
    pub fn invocation_count(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    /// All tools across all plugins, under their qualified wire names
    pub fn qualified_tools(&self) -> Vec<Tool> {
        let mut tools = Vec::new();
        for plugin in &self.plugins {
            for tool in plugin.tools() {
                tools.push(Tool::new(
                    qualify_name(plugin.name(), &tool.name),
                    tool.description.as_str(),
                    tool.input_schema.clone(),
                ));
            }
        }
        tools
    }

    fn plugin_named(&self, name: &str) -> Option<&dyn Plugin> {
        self.plugins
            .iter()
            .find(|plugin| plugin.name() == name)
            .map(|plugin| &**plugin)
    }

    /// Run one requested call and return its result.
    ///
    /// A request whose arguments failed to parse is never invoked; its
    /// result quotes the original parse failure.
    pub async fn dispatch(&self, request: &ToolRequest) -> ToolResult<Vec<Content>> {
        if let Some(failure) = &request.parse_failure {
            return Err(ToolError::InvalidArguments(failure.clone()));
        }

        let (plugin_name, tool_name) = split_qualified_name(&request.name)
            .ok_or_else(|| ToolError::ToolNotFound(request.name.clone()))?;
        let plugin = self
            .plugin_named(plugin_name)
            .ok_or_else(|| ToolError::ToolNotFound(request.name.clone()))?;

        let arguments = request
            .arguments
            .clone()
            .unwrap_or_else(|| serde_json::json!({}));

        debug!(tool = %request.name, id = %request.id, "dispatching tool call");
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let result = plugin.call(ToolCall::new(tool_name, arguments)).await;
        if let Err(error) = &result {
            warn!(tool = %request.name, id = %request.id, %error, "tool call failed");
        }
        result
    }
}
