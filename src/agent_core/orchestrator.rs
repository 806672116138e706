//! Conversation Orchestrator — the tool-calling loop.
//!
//! One user turn:
//!
//! ```text
//! AWAITING_MODEL ──answer──▶ DONE (commit user + answer to history)
//!      │  ▲
//! tool │  │ results appended
//! calls▼  │
//!  TOOL_DISPATCH
//! ```
//!
//! At most `max_iterations` model calls per turn; running out yields the
//! "taking too long" message. Each model call is retried with backoff on
//! transport and protocol failures; exhausting retries yields the "trouble
//! processing" message. Neither outcome changes stored history.

use std::sync::Arc;

use super::conversation::{ConversationStore, DEFAULT_HISTORY_WINDOW, DEFAULT_SESSION};
use super::tool_registry::ToolRegistry;
use crate::inference::{
    retry_with_backoff, ChatMessage, ChatModel, InferenceError, ModelReply, RetryPolicy, ToolCall,
    ToolDefinition,
};
use crate::site::UrlRecord;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Model calls allowed per turn before giving up.
pub const MAX_TOOL_ROUNDS: usize = 10;

/// Returned when the iteration ceiling is reached.
pub const TOO_LONG_MESSAGE: &str = "I'm sorry, this request is taking too long to process. \
    Please try rephrasing your question or asking about something more specific.";

/// Returned when the model could not be reached after retries.
pub const TROUBLE_MESSAGE: &str = "I'm sorry, I'm having trouble processing your request \
    right now. Please try again in a moment.";

/// System prompt used unless the configuration overrides it.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant for this company's website. \
Answer visitors' questions using the website's own content.

You have two tools:
- search_website_urls: find pages on the website relevant to the question.
- fetch_webpage_content: read the content of up to 3 pages.

For any question about the company, its products, pricing, services or articles, \
first search for relevant URLs, then fetch the most relevant pages and base your \
answer on what they say. Include links to the pages you used. If the website does \
not cover the question, say so plainly instead of guessing. Keep answers concise \
and friendly.";

// ─── Types ───────────────────────────────────────────────────────────────────

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model produced a final answer; the exchange was stored.
    Answered(String),
    /// The iteration ceiling was hit without an answer.
    IterationLimit { iterations: usize },
    /// Model calls kept failing; carries the last error message.
    ModelUnavailable { error: String },
}

impl TurnOutcome {
    /// Text shown to the user for this outcome.
    pub fn into_reply(self) -> String {
        match self {
            TurnOutcome::Answered(text) => text,
            TurnOutcome::IterationLimit { .. } => TOO_LONG_MESSAGE.to_string(),
            TurnOutcome::ModelUnavailable { .. } => TROUBLE_MESSAGE.to_string(),
        }
    }
}

// ─── Assistant ───────────────────────────────────────────────────────────────

/// Drives conversations between users, the model and the site tools.
pub struct Assistant {
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    tool_definitions: Vec<ToolDefinition>,
    conversations: ConversationStore,
    system_prompt: String,
    retry: RetryPolicy,
    max_iterations: usize,
}

impl Assistant {
    pub fn new(model: Arc<dyn ChatModel>, tools: ToolRegistry) -> Self {
        let tool_definitions = tools.definitions();
        Self {
            model,
            tools,
            tool_definitions,
            conversations: ConversationStore::new(DEFAULT_HISTORY_WINDOW),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            retry: RetryPolicy::default(),
            max_iterations: MAX_TOOL_ROUNDS,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.conversations =
            ConversationStore::with_limits(window, self.conversations.max_sessions());
        self
    }

    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.conversations =
            ConversationStore::with_limits(self.conversations.window(), max_sessions);
        self
    }

    /// Chat in the default session.
    pub async fn chat(&self, message: &str) -> String {
        self.chat_in(DEFAULT_SESSION, message).await
    }

    /// Chat in `session_id`. Never fails: errors map to fixed replies.
    pub async fn chat_in(&self, session_id: &str, message: &str) -> String {
        self.run_turn(session_id, message).await.into_reply()
    }

    /// Clear the default session's history.
    pub fn reset_conversation(&self) {
        self.reset_session(DEFAULT_SESSION);
    }

    /// Clear one session's history. Idempotent.
    pub fn reset_session(&self, session_id: &str) {
        let existed = self.conversations.reset(session_id);
        tracing::info!(session_id, existed, "conversation reset");
    }

    /// Every known site URL.
    pub fn get_all_urls(&self) -> &[UrlRecord] {
        self.tools.index().all()
    }

    /// Stored history for a session.
    pub fn history(&self, session_id: &str) -> Vec<ChatMessage> {
        self.conversations.history(session_id)
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Run one user turn to completion.
    pub async fn run_turn(&self, session_id: &str, message: &str) -> TurnOutcome {
        let user = ChatMessage::user(message);
        let mut messages = Vec::with_capacity(DEFAULT_HISTORY_WINDOW + 4);
        messages.push(ChatMessage::system(&self.system_prompt));
        messages.extend(self.conversations.history(session_id));
        messages.push(user.clone());

        tracing::info!(
            session_id,
            history_len = messages.len() - 2,
            message_len = message.len(),
            "=== TURN START ==="
        );

        for round in 1..=self.max_iterations {
            tracing::info!(session_id, round, "=== AGENT LOOP ROUND START ===");

            let reply = match self.call_model(&messages).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::error!(session_id, round, error = %e, "model unavailable, abandoning turn");
                    return TurnOutcome::ModelUnavailable {
                        error: e.to_string(),
                    };
                }
            };

            match reply {
                ModelReply::Answer(text) => {
                    // Only the user message and the answer are stored. The
                    // turn's tool requests and results are not carried into
                    // later turns, so a window cut never splits a request
                    // from its result; the next turn re-fetches what it needs.
                    self.conversations
                        .commit_turn(session_id, vec![user, ChatMessage::assistant(&text)]);
                    tracing::info!(session_id, round, answer_len = text.len(), "=== TURN DONE ===");
                    return TurnOutcome::Answered(text);
                }
                ModelReply::ToolCalls(calls) => {
                    tracing::info!(
                        session_id,
                        round,
                        tools = ?calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                        "=== TOOL DISPATCH ==="
                    );
                    messages.push(ChatMessage::assistant_tool_calls(&calls));
                    for call in &calls {
                        let payload = self.dispatch_tool_call(call).await;
                        messages.push(ChatMessage::tool_result(&call.id, payload));
                    }
                }
            }
        }

        tracing::warn!(
            session_id,
            iterations = self.max_iterations,
            "iteration ceiling reached without an answer"
        );
        TurnOutcome::IterationLimit {
            iterations: self.max_iterations,
        }
    }

    /// One logical model call, retried per the policy.
    async fn call_model(&self, messages: &[ChatMessage]) -> Result<ModelReply, InferenceError> {
        retry_with_backoff(&self.retry, InferenceError::is_retriable, |attempt| {
            tracing::debug!(attempt, message_count = messages.len(), "calling model");
            self.model.complete(messages, &self.tool_definitions)
        })
        .await
    }

    /// Dispatch a tool call and serialize its result for the model.
    async fn dispatch_tool_call(&self, call: &ToolCall) -> String {
        let value = match self.tools.dispatch(call).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(tool = %call.name, call_id = %call.id, error = %e, "tool call rejected");
                e.to_payload()
            }
        };
        value.to_string()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::time::{Duration, Instant};

    use crate::inference::Role;
    use crate::site::{Category, ContentFetcher, FetchError, PageSource, UrlIndex};

    type Responder = Box<dyn Fn(usize) -> Result<ModelReply, InferenceError> + Send + Sync>;

    /// Answers from a closure of the call index and records every request.
    struct ScriptedModel {
        responder: Responder,
        requests: Mutex<Vec<Vec<ChatMessage>>>,
        call_times: Mutex<Vec<Instant>>,
    }

    impl ScriptedModel {
        fn new(
            responder: impl Fn(usize) -> Result<ModelReply, InferenceError> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                responder: Box::new(responder),
                requests: Mutex::new(Vec::new()),
                call_times: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn request(&self, n: usize) -> Vec<ChatMessage> {
            self.requests.lock().unwrap()[n].clone()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(
            &self,
            messages: &[ChatMessage],
            tools: &[ToolDefinition],
        ) -> Result<ModelReply, InferenceError> {
            assert_eq!(tools.len(), 2, "both tools are offered on every call");
            let n = {
                let mut requests = self.requests.lock().unwrap();
                requests.push(messages.to_vec());
                requests.len() - 1
            };
            self.call_times.lock().unwrap().push(Instant::now());
            (self.responder)(n)
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    struct StaticSource;

    #[async_trait]
    impl PageSource for StaticSource {
        async fn get(&self, url: &str) -> Result<String, FetchError> {
            Ok(format!("<title>Page</title><main>Content of {url}</main>"))
        }
    }

    fn assistant(model: Arc<ScriptedModel>) -> Assistant {
        let index = UrlIndex::new(vec![
            UrlRecord::new("https://site.test/wordpress-hosting", Category::Page),
            UrlRecord::new("https://site.test/blog/wordpress-tips", Category::Blog),
        ]);
        let fetcher = ContentFetcher::new(Arc::new(StaticSource));
        Assistant::new(model, ToolRegistry::new(Arc::new(index), Arc::new(fetcher)))
    }

    fn tool_call(id: &str, name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    fn search_call(id: &str) -> ModelReply {
        ModelReply::ToolCalls(vec![tool_call(
            id,
            "search_website_urls",
            r#"{"query":"wordpress hosting"}"#,
        )])
    }

    fn answer(text: &str) -> Result<ModelReply, InferenceError> {
        Ok(ModelReply::Answer(text.into()))
    }

    fn roles(messages: &[ChatMessage]) -> Vec<Role> {
        messages.iter().map(|m| m.role).collect()
    }

    #[tokio::test]
    async fn test_plain_answer_updates_history() {
        let model = ScriptedModel::new(|_| answer("We offer WordPress hosting."));
        let assistant = assistant(model.clone());

        let reply = assistant.chat("Do you host WordPress?").await;
        assert_eq!(reply, "We offer WordPress hosting.");
        assert_eq!(model.calls(), 1);

        let first = model.request(0);
        assert_eq!(roles(&first), vec![Role::System, Role::User]);
        assert_eq!(first[0].content.as_deref(), Some(DEFAULT_SYSTEM_PROMPT));

        let history = assistant.history(DEFAULT_SESSION);
        assert_eq!(roles(&history), vec![Role::User, Role::Assistant]);
        assert_eq!(history[1].content.as_deref(), Some("We offer WordPress hosting."));
    }

    #[tokio::test]
    async fn test_tool_results_are_correlated_and_sent_back() {
        let model = ScriptedModel::new(|n| match n {
            0 => Ok(search_call("call_search")),
            _ => answer("See our hosting page."),
        });
        let assistant = assistant(model.clone());

        let reply = assistant.chat("wordpress hosting?").await;
        assert_eq!(reply, "See our hosting page.");

        let second = model.request(1);
        assert_eq!(
            roles(&second),
            vec![Role::System, Role::User, Role::Assistant, Role::Tool]
        );
        let requested = second[2].tool_calls.as_ref().unwrap();
        assert_eq!(requested[0].id, "call_search");
        assert_eq!(second[3].tool_call_id.as_deref(), Some("call_search"));

        let results: serde_json::Value =
            serde_json::from_str(second[3].content.as_deref().unwrap()).unwrap();
        assert_eq!(results[0]["url"], "https://site.test/wordpress-hosting");
        assert_eq!(results[0]["score"], 120);

        // Tool traffic is not part of stored history.
        assert_eq!(assistant.history(DEFAULT_SESSION).len(), 2);
    }

    #[tokio::test]
    async fn test_multiple_tool_calls_dispatched_in_order() {
        let model = ScriptedModel::new(|n| match n {
            0 => Ok(ModelReply::ToolCalls(vec![
                tool_call("call_a", "search_website_urls", r#"{"query":"blog"}"#),
                tool_call(
                    "call_b",
                    "fetch_webpage_content",
                    r#"{"urls":["https://site.test/wordpress-hosting"]}"#,
                ),
            ])),
            _ => answer("done"),
        });
        let assistant = assistant(model.clone());
        assistant.chat("tell me").await;

        let second = model.request(1);
        assert_eq!(second[3].tool_call_id.as_deref(), Some("call_a"));
        assert_eq!(second[4].tool_call_id.as_deref(), Some("call_b"));
        let pages: serde_json::Value =
            serde_json::from_str(second[4].content.as_deref().unwrap()).unwrap();
        assert_eq!(
            pages[0]["content"],
            "Content of https://site.test/wordpress-hosting"
        );
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_error_payload() {
        let model = ScriptedModel::new(|n| match n {
            0 => Ok(ModelReply::ToolCalls(vec![tool_call("call_x", "drop_tables", "{}")])),
            _ => answer("recovered"),
        });
        let assistant = assistant(model.clone());

        assert_eq!(assistant.chat("hi").await, "recovered");
        let second = model.request(1);
        let payload: serde_json::Value =
            serde_json::from_str(second[3].content.as_deref().unwrap()).unwrap();
        assert_eq!(payload["error"], "unknown tool: drop_tables");
    }

    #[tokio::test]
    async fn test_invalid_arguments_become_error_payload() {
        let model = ScriptedModel::new(|n| match n {
            0 => Ok(ModelReply::ToolCalls(vec![tool_call(
                "call_bad",
                "search_website_urls",
                "{\"query\": ",
            )])),
            _ => answer("ok"),
        });
        let assistant = assistant(model.clone());

        assert_eq!(assistant.chat("hi").await, "ok");
        let payload: serde_json::Value =
            serde_json::from_str(model.request(1)[3].content.as_deref().unwrap()).unwrap();
        assert!(payload["error"]
            .as_str()
            .unwrap()
            .starts_with("invalid arguments for search_website_urls"));
    }

    #[tokio::test]
    async fn test_iteration_ceiling_leaves_history_untouched() {
        let model = ScriptedModel::new(|n| match n {
            0 => answer("first answer"),
            n => Ok(search_call(&format!("call_{n}"))),
        });
        let assistant = assistant(model.clone());
        assistant.chat("first").await;
        let before = assistant.history(DEFAULT_SESSION);

        let reply = assistant.chat("loop forever").await;
        assert_eq!(reply, TOO_LONG_MESSAGE);
        assert_eq!(model.calls(), 1 + MAX_TOOL_ROUNDS);
        assert_eq!(assistant.history(DEFAULT_SESSION), before);
    }

    #[tokio::test]
    async fn test_run_turn_reports_iteration_limit() {
        let model = ScriptedModel::new(|n| Ok(search_call(&format!("call_{n}"))));
        let assistant = assistant(model.clone()).with_max_iterations(2);

        let outcome = assistant.run_turn("s", "hi").await;
        assert_eq!(outcome, TurnOutcome::IterationLimit { iterations: 2 });
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_retried_with_backoff() {
        let model = ScriptedModel::new(|n| match n {
            0 => Err(InferenceError::HttpError {
                status: 503,
                body: "overloaded".into(),
            }),
            1 => Err(InferenceError::Timeout { duration_secs: 60 }),
            _ => answer("third time lucky"),
        });
        let assistant = assistant(model.clone());

        assert_eq!(assistant.chat("hi").await, "third time lucky");
        let times = model.call_times.lock().unwrap().clone();
        assert_eq!(times.len(), 3);
        let first_gap = times[1] - times[0];
        let second_gap = times[2] - times[1];
        assert!(first_gap >= Duration::from_millis(1000) && first_gap < Duration::from_millis(1005));
        assert!(second_gap >= Duration::from_millis(2000) && second_gap < Duration::from_millis(2005));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_keep_prior_history() {
        let model = ScriptedModel::new(|n| match n {
            0 => answer("hello"),
            _ => Err(InferenceError::ConnectionFailed {
                endpoint: "https://api.test".into(),
                reason: "refused".into(),
            }),
        });
        let assistant = assistant(model.clone());
        assistant.chat("first").await;
        let before = assistant.history(DEFAULT_SESSION);

        let reply = assistant.chat("second").await;
        assert_eq!(reply, TROUBLE_MESSAGE);
        assert_eq!(model.calls(), 1 + 3);
        assert_eq!(assistant.history(DEFAULT_SESSION), before);
    }

    #[tokio::test]
    async fn test_non_retriable_error_fails_fast() {
        let model = ScriptedModel::new(|_| {
            Err(InferenceError::ConfigError {
                reason: "no key".into(),
            })
        });
        let assistant = assistant(model.clone());

        let outcome = assistant.run_turn(DEFAULT_SESSION, "hi").await;
        assert!(matches!(outcome, TurnOutcome::ModelUnavailable { .. }));
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_history_sent_on_next_turn_and_reset_clears_it() {
        let model = ScriptedModel::new(|n| answer(&format!("answer {n}")));
        let assistant = assistant(model.clone());

        assistant.chat("q0").await;
        assistant.chat("q1").await;
        assert_eq!(
            roles(&model.request(1)),
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );

        assistant.reset_conversation();
        assistant.reset_conversation();
        assistant.chat("q2").await;
        let after_reset = model.request(2);
        assert_eq!(roles(&after_reset), vec![Role::System, Role::User]);
        assert_eq!(after_reset[1].content.as_deref(), Some("q2"));
    }

    #[tokio::test]
    async fn test_history_window_trims_oldest() {
        let model = ScriptedModel::new(|n| answer(&format!("answer {n}")));
        let assistant = assistant(model.clone());
        for n in 0..8 {
            assistant.chat(&format!("q{n}")).await;
        }
        let history = assistant.history(DEFAULT_SESSION);
        assert_eq!(history.len(), DEFAULT_HISTORY_WINDOW);
        assert_eq!(history[0].content.as_deref(), Some("q3"));
        // system + 10 stored + new user
        assert_eq!(model.request(7).len(), 1 + DEFAULT_HISTORY_WINDOW + 1);
    }

    #[tokio::test]
    async fn test_sessions_do_not_share_history() {
        let model = ScriptedModel::new(|n| answer(&format!("answer {n}")));
        let assistant = assistant(model.clone());

        assistant.chat_in("alice", "hello from alice").await;
        assistant.chat_in("bob", "hello from bob").await;
        assert_eq!(roles(&model.request(1)), vec![Role::System, Role::User]);

        assistant.reset_session("alice");
        assert!(assistant.history("alice").is_empty());
        assert_eq!(assistant.history("bob").len(), 2);
    }

    #[tokio::test]
    async fn test_session_limit_applies_to_assistant() {
        let model = ScriptedModel::new(|n| answer(&format!("answer {n}")));
        let assistant = assistant(model.clone())
            .with_max_sessions(2)
            .with_history_window(4);

        for n in 0..5 {
            assistant.chat_in(&format!("visitor-{n}"), "hello").await;
        }
        assert!(assistant.history("visitor-0").is_empty());
        assert!(assistant.history("visitor-2").is_empty());
        assert_eq!(assistant.history("visitor-3").len(), 2);
        assert_eq!(assistant.history("visitor-4").len(), 2);
    }

    #[tokio::test]
    async fn test_system_prompt_override() {
        let model = ScriptedModel::new(|_| answer("ok"));
        let assistant = assistant(model.clone()).with_system_prompt("Be brief.");
        assistant.chat("hi").await;
        assert_eq!(model.request(0)[0].content.as_deref(), Some("Be brief."));
    }

    #[test]
    fn test_get_all_urls_is_read_only_view() {
        let assistant = assistant(ScriptedModel::new(|_| answer("ok")));
        let urls = assistant.get_all_urls();
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[1].category, Category::Blog);
        assert_eq!(assistant.get_all_urls(), urls);
    }
}
