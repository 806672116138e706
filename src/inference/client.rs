//! OpenAI-compatible inference client.
//!
//! Sends one non-streaming chat completion request per call and parses the
//! reply into a [`ModelReply`]. Retrying is the caller's concern; see
//! [`super::retry`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;

use super::errors::InferenceError;
use super::response::parse_completion_response;
use super::types::{ChatCompletionRequest, ChatMessage, ModelReply, ToolDefinition};
use crate::config::ModelSettings;

// ─── Constants ───────────────────────────────────────────────────────────────

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Tool choice sent with every request that carries tools.
const TOOL_CHOICE_AUTO: &str = "auto";

// ─── ChatModel ───────────────────────────────────────────────────────────────

/// A chat model that can answer or request tool invocations.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Make exactly one completion call.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply, InferenceError>;

    /// Model identifier, for logs.
    fn model_name(&self) -> &str;
}

// ─── InferenceClient ─────────────────────────────────────────────────────────

/// HTTP client for a remote OpenAI-compatible chat completion endpoint.
pub struct InferenceClient {
    http: HttpClient,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl InferenceClient {
    /// Build a client from settings. Does NOT check connectivity.
    pub fn from_settings(settings: &ModelSettings) -> Result<Self, InferenceError> {
        if settings.api_key.trim().is_empty() {
            return Err(InferenceError::ConfigError {
                reason: "model API key is empty (set OPENAI_API_KEY or model.api_key)".into(),
            });
        }

        let timeout = Duration::from_secs(settings.timeout_secs);
        let endpoint = format!(
            "{}/chat/completions",
            settings.base_url.trim_end_matches('/')
        );

        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()
            .map_err(|e| InferenceError::ConnectionFailed {
                endpoint: endpoint.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            endpoint,
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            timeout,
        })
    }

    /// Full URL requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_request(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> ChatCompletionRequest {
        let has_tools = !tools.is_empty();
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            tools: has_tools.then(|| tools.to_vec()),
            tool_choice: has_tools.then(|| TOOL_CHOICE_AUTO.to_string()),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[async_trait]
impl ChatModel for InferenceClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply, InferenceError> {
        let body = self.build_request(messages, tools);

        tracing::info!(
            url = %self.endpoint,
            model = %body.model,
            message_count = body.messages.len(),
            tool_count = tools.len(),
            "=== LLM REQUEST ==="
        );

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InferenceError::Timeout {
                        duration_secs: self.timeout.as_secs(),
                    }
                } else {
                    InferenceError::ConnectionFailed {
                        endpoint: self.endpoint.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(InferenceError::HttpError {
                status: status.as_u16(),
                body,
            });
        }

        let text = resp.text().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Timeout {
                    duration_secs: self.timeout.as_secs(),
                }
            } else {
                InferenceError::ConnectionFailed {
                    endpoint: self.endpoint.clone(),
                    reason: format!("failed to read response body: {e}"),
                }
            }
        })?;

        let reply = parse_completion_response(&text)?;
        let kind = match &reply {
            ModelReply::Answer(_) => "answer",
            ModelReply::ToolCalls(calls) => {
                tracing::debug!(count = calls.len(), "model requested tools");
                "tool_calls"
            }
        };
        tracing::info!(reply = kind, "=== LLM RESPONSE ===");
        Ok(reply)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(base_url: &str) -> ModelSettings {
        ModelSettings {
            api_key: "sk-test".into(),
            base_url: base_url.into(),
            ..ModelSettings::default()
        }
    }

    fn search_tool() -> ToolDefinition {
        ToolDefinition::function(
            "search_website_urls",
            "search",
            serde_json::json!({"type": "object"}),
        )
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let mut s = settings("http://localhost");
        s.api_key = "  ".into();
        let err = InferenceClient::from_settings(&s).err().unwrap();
        assert!(matches!(err, InferenceError::ConfigError { .. }));
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let client = InferenceClient::from_settings(&settings("https://api.test/v1/")).unwrap();
        assert_eq!(client.endpoint(), "https://api.test/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_request_shape_and_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "Hi there"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            InferenceClient::from_settings(&settings(&format!("{}/v1", server.uri()))).unwrap();
        let reply = client
            .complete(&[ChatMessage::user("hello")], &[search_tool()])
            .await
            .unwrap();
        assert_eq!(reply, ModelReply::Answer("Hi there".into()));

        let requests = server.received_requests().await.unwrap();
        let sent: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(sent["model"], "gpt-4o-mini");
        assert_eq!(sent["tool_choice"], "auto");
        assert_eq!(sent["max_tokens"], 4000);
        assert!((sent["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
        assert_eq!(sent["tools"][0]["function"]["name"], "search_website_urls");
        assert_eq!(sent["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn test_non_success_status_is_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let client = InferenceClient::from_settings(&settings(&server.uri())).unwrap();
        let err = client
            .complete(&[ChatMessage::user("hello")], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::HttpError { status: 429, ref body } if body == "rate limited"));
        assert!(err.is_retriable());
    }

    #[tokio::test]
    async fn test_malformed_body_is_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let client = InferenceClient::from_settings(&settings(&server.uri())).unwrap();
        let err = client
            .complete(&[ChatMessage::user("hello")], &[])
            .await
            .unwrap_err();
        assert!(err.is_protocol());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        // Port 9 (discard) on localhost is not expected to accept connections.
        let client = InferenceClient::from_settings(&settings("http://127.0.0.1:9")).unwrap();
        let err = client
            .complete(&[ChatMessage::user("hello")], &[])
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }
}
