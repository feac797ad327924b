//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, Azure OpenAI deployments, and any endpoint exposing an
//! OpenAI-style `/chat/completions` route with SSE streaming.
//!
//! The transport forwards raw tool-call fragments exactly as they arrive.
//! Merging them into complete tool calls is the agent's job.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use toolrelay_core::error::ProviderError;
use toolrelay_core::message::{Message, Role};
use toolrelay_core::provider::*;
use tracing::{debug, warn};

use crate::sse::{SseEvent, SseLineBuffer, parse_line};

/// Where and how requests are addressed.
#[derive(Debug, Clone, PartialEq)]
enum Endpoint {
    /// `<base_url>/chat/completions` with bearer auth
    OpenAi { base_url: String },
    /// `<endpoint>/openai/deployments/<model>/chat/completions?api-version=<v>`
    /// with the `api-key` header
    Azure {
        endpoint: String,
        api_version: String,
    },
}

/// An OpenAI-compatible streaming LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    endpoint: Endpoint,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        Self::with_endpoint(
            name.into(),
            Endpoint::OpenAi {
                base_url: base_url.into().trim_end_matches('/').to_string(),
            },
            api_key.into(),
        )
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create an Azure OpenAI provider. The request `model` names the deployment.
    pub fn azure(
        endpoint: impl Into<String>,
        api_version: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        Self::with_endpoint(
            "azure".into(),
            Endpoint::Azure {
                endpoint: endpoint.into().trim_end_matches('/').to_string(),
                api_version: api_version.into(),
            },
            api_key.into(),
        )
    }

    fn with_endpoint(
        name: String,
        endpoint: Endpoint,
        api_key: String,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name,
            endpoint,
            api_key,
            client,
        })
    }

    /// The chat-completions URL for `model`.
    fn chat_url(&self, model: &str) -> String {
        match &self.endpoint {
            Endpoint::OpenAi { base_url } => format!("{base_url}/chat/completions"),
            Endpoint::Azure {
                endpoint,
                api_version,
            } => format!(
                "{endpoint}/openai/deployments/{model}/chat/completions?api-version={api_version}"
            ),
        }
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.endpoint {
            Endpoint::OpenAi { .. } => {
                builder.header("Authorization", format!("Bearer {}", self.api_key))
            }
            Endpoint::Azure { .. } => builder.header("api-key", &self.api_key),
        }
    }

    /// Build the JSON request body.
    fn request_body(request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": request.stream,
        });

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        body
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| {
                let tool_calls = if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        m.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: tc
                                    .kind
                                    .clone()
                                    .map(String::from)
                                    .unwrap_or_else(|| "function".into()),
                                function: ApiFunction {
                                    name: tc.name_or_empty().to_string(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                };

                // Tool-only assistant turns go out with null content
                let content = if m.content.is_empty() && tool_calls.is_some() {
                    None
                } else {
                    Some(m.content.clone())
                };

                ApiMessage {
                    role: m.role.as_str(),
                    content,
                    tool_calls,
                    tool_call_id: match m.role {
                        Role::Tool => m.tool_call_id.clone(),
                        _ => None,
                    },
                }
            })
            .collect()
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function",
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let url = self.chat_url(&request.model);
        let body = Self::request_body(&request);

        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending streaming request"
        );

        let response = self
            .authorize(self.client.post(&url))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider streaming error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let (tx, rx) = tokio::sync::mpsc::channel(64);

        // Read the SSE byte stream in the background and forward chunks
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut lines = SseLineBuffer::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                for line in lines.push(&bytes) {
                    match parse_line(&line) {
                        SseEvent::Chunk(chunk) => {
                            if tx.send(Ok(chunk)).await.is_err() {
                                return; // receiver dropped
                            }
                        }
                        SseEvent::Done => return,
                        SseEvent::Skip => {}
                    }
                }
            }

            // Stream ended without a trailing newline
            if let Some(line) = lines.finish()
                && let SseEvent::Chunk(chunk) = parse_line(&line)
            {
                let _ = tx.send(Ok(chunk)).await;
            }
        });

        Ok(rx)
    }
}

// --- OpenAI API request types (internal) ---

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ApiToolCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiToolDefinition {
    r#type: &'static str,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolrelay_core::message::ToolCallRequest;

    #[test]
    fn openai_constructor() {
        let provider = OpenAiCompatProvider::openai("sk-test").unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(
            provider.chat_url("gpt-4o"),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn custom_base_url_trailing_slash() {
        let provider = OpenAiCompatProvider::new("local", "http://localhost:8000/v1/", "x").unwrap();
        assert_eq!(
            provider.chat_url("any"),
            "http://localhost:8000/v1/chat/completions"
        );
    }

    #[test]
    fn azure_url_uses_deployment_and_version() {
        let provider = OpenAiCompatProvider::azure(
            "https://corp.openai.azure.com/",
            "2025-01-01-preview",
            "key",
        )
        .unwrap();
        assert_eq!(
            provider.chat_url("gpt-4o"),
            "https://corp.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2025-01-01-preview"
        );
    }

    #[test]
    fn request_body_is_streaming_and_deterministic() {
        let request = ProviderRequest::streaming(
            "gpt-4o",
            vec![Message::user("list users")],
            vec![ToolDefinition {
                name: "search_user".into(),
                description: "Search users".into(),
                parameters: serde_json::json!({"type": "object"}),
            }],
        );
        let body = OpenAiCompatProvider::request_body(&request);
        assert_eq!(body["stream"], true);
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "search_user");
    }

    #[test]
    fn request_body_omits_empty_tools() {
        let request = ProviderRequest::streaming("gpt-4o", vec![Message::user("hi")], vec![]);
        let body = OpenAiCompatProvider::request_body(&request);
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn message_conversion() {
        let messages = vec![Message::system("You are helpful"), Message::user("Hello")];
        let api_messages = OpenAiCompatProvider::to_api_messages(&messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
    }

    #[test]
    fn message_conversion_with_tool_calls() {
        let msg = Message::assistant_with_tools(
            "",
            vec![ToolCallRequest::function(
                "call_1",
                "get_user_by_id",
                r#"{"id":7}"#,
            )],
        );
        let api_msgs = OpenAiCompatProvider::to_api_messages(&[msg]);
        assert!(api_msgs[0].content.is_none());
        let tc = api_msgs[0].tool_calls.as_ref().unwrap();
        assert_eq!(tc[0].id.as_deref(), Some("call_1"));
        assert_eq!(tc[0].r#type, "function");
        assert_eq!(tc[0].function.name, "get_user_by_id");

        let json = serde_json::to_value(&api_msgs[0]).unwrap();
        assert!(json["content"].is_null());
    }

    #[test]
    fn message_conversion_tool_response() {
        let msg = Message::tool_result(Some("call_1".into()), "result data");
        let api_msgs = OpenAiCompatProvider::to_api_messages(&[msg]);
        assert_eq!(api_msgs[0].role, "tool");
        assert_eq!(api_msgs[0].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(api_msgs[0].content.as_deref(), Some("result data"));
    }

    #[test]
    fn nameless_tool_call_is_sent_with_empty_name() {
        let msg = Message::assistant_with_tools(
            "",
            vec![ToolCallRequest {
                id: None,
                name: None,
                arguments: String::new(),
                kind: None,
            }],
        );
        let api_msgs = OpenAiCompatProvider::to_api_messages(&[msg]);
        let tc = &api_msgs[0].tool_calls.as_ref().unwrap()[0];
        assert_eq!(tc.function.name, "");
        assert!(tc.id.is_none());
    }
}
