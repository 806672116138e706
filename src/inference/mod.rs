//! Inference Client — OpenAI-compatible API client for the remote model.
//!
//! This module handles all communication with the model endpoint:
//! - Non-streaming chat completions with function calling
//! - Response parsing into answers or tool invocations
//! - Retry with exponential backoff
//!
//! The client speaks the OpenAI Chat Completions API, so any compatible
//! provider works by changing `model.base_url`.

pub mod client;
pub mod errors;
pub mod response;
pub mod retry;
pub mod types;

// Re-exports for convenience
pub use client::{ChatModel, InferenceClient};
pub use errors::InferenceError;
pub use retry::{retry_with_backoff, RetryPolicy};
pub use types::{ChatMessage, ModelReply, Role, ToolCall, ToolDefinition};
