//! Provider trait: the abstraction over the streaming completion transport.
//!
//! A Provider knows how to send a conversation plus a tool catalog to an LLM
//! and hand back the raw stream of response deltas. Authentication, model
//! selection and network policy belong to the implementation; the agent loop
//! only sees [`StreamChunk`]s.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::message::{Message, ToolCallKind};

/// Sampling temperature used for every tool-calling round.
pub const DETERMINISTIC_TEMPERATURE: f32 = 0.0;

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model (or Azure deployment) to use
    pub model: String,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic)
    pub temperature: f32,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Whether to stream the response
    #[serde(default)]
    pub stream: bool,
}

impl ProviderRequest {
    /// A streaming, deterministic request, the only kind the agent loop sends.
    pub fn streaming(
        model: impl Into<String>,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
    ) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: DETERMINISTIC_TEMPERATURE,
            tools,
            stream: true,
        }
    }
}

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// Token usage information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One partial tool call as it arrives on the stream.
///
/// Fragments sharing an `index` belong to the same tool call. Any subset of
/// the optional fields may be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeltaFragment {
    /// Stream position of the tool call this fragment belongs to
    pub index: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Argument text to append to what has been received so far
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ToolCallKind>,
}

impl DeltaFragment {
    /// An empty fragment for `index`.
    pub fn at(index: u32) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_arguments(mut self, chunk: impl Into<String>) -> Self {
        self.arguments = Some(chunk.into());
        self
    }

    pub fn with_kind(mut self, kind: ToolCallKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

/// A single chunk in a streaming response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Content token, in arrival order
    #[serde(default)]
    pub content: Option<String>,

    /// Raw tool call fragments carried by this chunk
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<DeltaFragment>,

    /// Set on the chunk that ends the choice ("stop", "tool_calls", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,

    /// Usage info (typically only in the final chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl StreamChunk {
    /// A chunk carrying only a content token.
    pub fn token(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Self::default()
        }
    }

    /// A chunk carrying only tool call fragments.
    pub fn fragments(fragments: Vec<DeltaFragment>) -> Self {
        Self {
            tool_calls: fragments,
            ..Self::default()
        }
    }
}

/// Receiving end of a provider stream.
pub type ChunkReceiver = mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>;

/// The completion transport.
///
/// The agent loop calls `stream()` without knowing which backend is in use.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "azure").
    fn name(&self) -> &str;

    /// Send a request and get a stream of response chunks.
    ///
    /// Errors before the first byte come back directly; errors mid-stream
    /// arrive as `Err` items on the receiver.
    async fn stream(&self, request: ProviderRequest)
    -> std::result::Result<ChunkReceiver, ProviderError>;
}
