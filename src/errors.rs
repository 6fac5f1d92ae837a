use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-call tool failures. These are data carried inside the exchange,
/// never control flow: a failed call becomes an error-valued tool result
/// and the exchange continues. Fatal failures (transport, vendor error
/// bodies) use `anyhow::Error` instead.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {0}")]
    ExecutionError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ToolResult<T> = Result<T, ToolError>;
