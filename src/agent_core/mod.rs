//! Agent Core — orchestration layer for the site assistant.
//!
//! Submodules:
//! - `conversation`: Per-session history windows
//! - `tool_registry`: Tool declarations and dispatch to the site layer
//! - `orchestrator`: The tool-calling loop with retry and iteration ceiling
//! - `errors`: Tool-level error types

pub mod conversation;
pub mod errors;
pub mod orchestrator;
pub mod tool_registry;

// Re-exports for convenience
pub use conversation::{ConversationStore, DEFAULT_SESSION};
pub use errors::ToolError;
pub use orchestrator::{Assistant, TurnOutcome, TOO_LONG_MESSAGE, TROUBLE_MESSAGE};
pub use tool_registry::{ToolInvocation, ToolRegistry};
