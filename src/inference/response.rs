//! Chat completion response parsing.
//!
//! Accepts `choices[0].message` carrying either `tool_calls` or `content`.
//! Anything else (no choices, neither field, undecodable JSON) is a
//! `MalformedResponse`, which the caller treats as retriable.

use serde::Deserialize;
use uuid::Uuid;

use super::errors::InferenceError;
use super::types::{ModelReply, ToolCall};

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: Option<CompletionMessage>,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<CompletionToolCall>>,
}

#[derive(Deserialize)]
struct CompletionToolCall {
    id: Option<String>,
    function: CompletionFunction,
}

#[derive(Deserialize)]
struct CompletionFunction {
    name: String,
    #[serde(default)]
    arguments: Option<String>,
}

/// Parse a non-streaming chat completion body into a [`ModelReply`].
///
/// Tool calls win over content when both are present. Missing call ids are
/// replaced with a generated `call_<uuid>`; missing arguments become `{}`.
pub fn parse_completion_response(body: &str) -> Result<ModelReply, InferenceError> {
    let resp: CompletionResponse =
        serde_json::from_str(body).map_err(|e| InferenceError::MalformedResponse {
            reason: format!("invalid JSON body: {e}"),
        })?;

    let message = resp
        .choices
        .into_iter()
        .next()
        .ok_or(InferenceError::MalformedResponse {
            reason: "empty choices array".into(),
        })?
        .message
        .ok_or(InferenceError::MalformedResponse {
            reason: "choice has no message".into(),
        })?;

    if let Some(calls) = message.tool_calls.filter(|c| !c.is_empty()) {
        let calls = calls
            .into_iter()
            .map(|tc| ToolCall {
                id: tc
                    .id
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| format!("call_{}", Uuid::new_v4())),
                name: tc.function.name,
                arguments: tc
                    .function
                    .arguments
                    .filter(|a| !a.trim().is_empty())
                    .unwrap_or_else(|| "{}".to_string()),
            })
            .collect();
        return Ok(ModelReply::ToolCalls(calls));
    }

    match message.content {
        Some(text) => Ok(ModelReply::Answer(text)),
        None => Err(InferenceError::MalformedResponse {
            reason: "message has neither content nor tool_calls".into(),
        }),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
