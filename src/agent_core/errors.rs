//! Agent Core error types.

use thiserror::Error;

/// Errors raised while turning a model tool call into a result.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The model named a tool that is not registered.
    #[error("unknown tool: {name}")]
    UnknownTool { name: String },

    /// The arguments JSON did not match the tool's schema.
    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// The tool ran but its result could not be produced.
    #[error("tool execution failed for {tool}: {reason}")]
    ExecutionFailed { tool: String, reason: String },
}

impl ToolError {
    /// JSON payload reported back to the model in place of a result.
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.to_string() })
    }
}
