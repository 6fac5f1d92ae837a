use serde::{Deserialize, Serialize};

/// Governs what tool information is sent to the model and whether the
/// connector runs requested calls itself.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum ToolCallBehavior {
    /// No tools are advertised and no tool_choice is sent.
    #[default]
    Disabled,
    /// Registry tools are advertised; requested calls are returned to the
    /// caller, never run by the connector.
    Advertised,
    /// Registry tools are advertised and requested calls are run
    /// automatically, up to the round-trip ceiling.
    AutoInvoke,
    /// A single tool is advertised and forced as the choice on the first
    /// request of the exchange. Every later request in the same exchange
    /// sends tool_choice "none": the required call has already happened.
    Required {
        /// Fully qualified `{plugin}-{tool}` name
        tool_name: String,
        auto_invoke: bool,
    },
}

impl ToolCallBehavior {
    /// Whether registry tools should be sent to the model at all
    pub fn advertises_tools(&self) -> bool {
        !matches!(self, ToolCallBehavior::Disabled)
    }

    /// Whether the connector runs requested calls itself
    pub fn auto_invokes(&self) -> bool {
        match self {
            ToolCallBehavior::AutoInvoke => true,
            ToolCallBehavior::Required { auto_invoke, .. } => *auto_invoke,
            _ => false,
        }
    }
}

/// Per-exchange model parameters. Sampling knobs are passed through to the
/// wire payload as-is; only `tool_call_behavior` is interpreted by the
/// connector. Immutable for the duration of an exchange.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExecutionSettings {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<i32>,
    pub stop: Option<Vec<String>>,
    pub user: Option<String>,
    pub tool_call_behavior: ToolCallBehavior,
}

impl ExecutionSettings {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: i32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_tool_call_behavior(mut self, behavior: ToolCallBehavior) -> Self {
        self.tool_call_behavior = behavior;
        self
    }
}
