//! Tool Registry — the two capabilities the model can invoke.
//!
//! - `search_website_urls(query, limit = 5)`: relevance search over the URL index
//! - `fetch_webpage_content(urls)`: fetch up to 3 pages and return their text
//!
//! Arguments arrive as raw JSON strings and are decoded into a typed
//! [`ToolInvocation`] at the dispatch boundary. Unknown names and undecodable
//! arguments are `ToolError`s; failures while running a decoded invocation are
//! returned as an `{"error": ...}` payload so the conversation can continue.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use super::errors::ToolError;
use crate::inference::types::{ToolCall, ToolDefinition};
use crate::site::fetcher::DEFAULT_MAX_CONCURRENT;
use crate::site::{ContentFetcher, UrlIndex};

// ─── Constants ───────────────────────────────────────────────────────────────

pub const SEARCH_TOOL_NAME: &str = "search_website_urls";
pub const FETCH_TOOL_NAME: &str = "fetch_webpage_content";

/// Results returned by a search when the model omits `limit`.
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

/// URLs beyond this many in one fetch call are dropped.
pub const MAX_FETCH_URLS: usize = 3;

// ─── ToolInvocation ──────────────────────────────────────────────────────────

/// A decoded, validated tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolInvocation {
    SearchWebsiteUrls { query: String, limit: usize },
    FetchWebpageContent { urls: Vec<String> },
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct FetchArgs {
    urls: Vec<String>,
}

impl ToolInvocation {
    /// Decode a tool name plus raw JSON arguments.
    pub fn decode(name: &str, arguments: &str) -> Result<Self, ToolError> {
        let invalid = |e: serde_json::Error| ToolError::InvalidArguments {
            tool: name.to_string(),
            reason: e.to_string(),
        };

        match name {
            SEARCH_TOOL_NAME => {
                let args: SearchArgs = serde_json::from_str(arguments).map_err(invalid)?;
                Ok(ToolInvocation::SearchWebsiteUrls {
                    query: args.query,
                    limit: args.limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
                })
            }
            FETCH_TOOL_NAME => {
                let args: FetchArgs = serde_json::from_str(arguments).map_err(invalid)?;
                let mut urls = args.urls;
                urls.truncate(MAX_FETCH_URLS);
                Ok(ToolInvocation::FetchWebpageContent { urls })
            }
            other => Err(ToolError::UnknownTool {
                name: other.to_string(),
            }),
        }
    }

    pub fn tool_name(&self) -> &'static str {
        match self {
            ToolInvocation::SearchWebsiteUrls { .. } => SEARCH_TOOL_NAME,
            ToolInvocation::FetchWebpageContent { .. } => FETCH_TOOL_NAME,
        }
    }
}

// ─── ToolRegistry ────────────────────────────────────────────────────────────

/// Declares the tools and executes invocations against the site layer.
pub struct ToolRegistry {
    index: Arc<UrlIndex>,
    fetcher: Arc<ContentFetcher>,
}

impl ToolRegistry {
    pub fn new(index: Arc<UrlIndex>, fetcher: Arc<ContentFetcher>) -> Self {
        Self { index, fetcher }
    }

    pub fn index(&self) -> &UrlIndex {
        &self.index
    }

    /// Schemas sent to the model with every request.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::function(
                SEARCH_TOOL_NAME,
                "Search the website's known URLs for pages relevant to the user's \
                    question. Returns URLs with title, category and a relevance score. \
                    Call this first, then fetch the most relevant pages.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "Search terms, e.g. \"wordpress hosting pricing\""
                        },
                        "limit": {
                            "type": "integer",
                            "description": "Maximum number of results (default 5)",
                            "default": DEFAULT_SEARCH_LIMIT
                        }
                    },
                    "required": ["query"]
                }),
            ),
            ToolDefinition::function(
                FETCH_TOOL_NAME,
                "Fetch pages from the website and return their title, description \
                    and main text content. At most 3 URLs are fetched per call.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "urls": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "Full page URLs, usually taken from search results"
                        }
                    },
                    "required": ["urls"]
                }),
            ),
        ]
    }

    /// Decode and execute one model tool call.
    ///
    /// Returns `Err` for unknown tools and undecodable arguments. Execution
    /// failures come back as `Ok({"error": ...})`.
    pub async fn dispatch(&self, call: &ToolCall) -> Result<Value, ToolError> {
        let invocation = ToolInvocation::decode(&call.name, &call.arguments)?;
        let tool = invocation.tool_name();
        let start = std::time::Instant::now();

        let payload = match self.execute(invocation).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(tool, error = %e, "tool execution failed");
                e.to_payload()
            }
        };

        tracing::info!(
            tool,
            call_id = %call.id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "tool dispatched"
        );
        Ok(payload)
    }

    async fn execute(&self, invocation: ToolInvocation) -> Result<Value, ToolError> {
        let tool = invocation.tool_name();
        let serialized = match invocation {
            ToolInvocation::SearchWebsiteUrls { query, limit } => {
                let results = self.index.search(&query, limit);
                tracing::debug!(query = %query, limit, results = results.len(), "search tool");
                serde_json::to_value(results)
            }
            ToolInvocation::FetchWebpageContent { urls } => {
                let outcomes = self.fetcher.fetch_many(&urls, DEFAULT_MAX_CONCURRENT).await;
                serde_json::to_value(outcomes)
            }
        };

        serialized.map_err(|e| ToolError::ExecutionFailed {
            tool: tool.to_string(),
            reason: e.to_string(),
        })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
