//! Message domain types.
//!
//! These are the value objects that flow through an exchange:
//! history → provider → assistant message → tool calls → tool results → history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// The end user
    User,
    /// The model
    Assistant,
    /// Tool execution result
    Tool,
}

impl Role {
    /// Wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content (may be empty for assistant messages that only call tools)
    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content.into())
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content.into())
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content.into())
    }

    /// Create an assistant message that requests tool execution.
    pub fn assistant_with_tools(
        content: impl Into<String>,
        tool_calls: Vec<ToolCallRequest>,
    ) -> Self {
        let mut msg = Self::assistant(content);
        msg.tool_calls = tool_calls;
        msg
    }

    /// Create a tool result message.
    ///
    /// `tool_call_id` is optional because a streamed tool call may never
    /// have received an id.
    pub fn tool_result(tool_call_id: Option<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::with_role(Role::Tool, content.into());
        msg.tool_call_id = tool_call_id;
        msg
    }

    /// Whether this message asks for tool execution.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Type discriminator of a tool call.
///
/// Only function calls are dispatched today; anything else the transport
/// sends is preserved verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ToolCallKind {
    Function,
    Other(String),
}

impl From<String> for ToolCallKind {
    fn from(value: String) -> Self {
        if value == "function" {
            ToolCallKind::Function
        } else {
            ToolCallKind::Other(value)
        }
    }
}

impl From<ToolCallKind> for String {
    fn from(kind: ToolCallKind) -> Self {
        match kind {
            ToolCallKind::Function => "function".into(),
            ToolCallKind::Other(s) => s,
        }
    }
}

/// A single tool invocation requested by the model.
///
/// Fields the stream never supplied stay `None`; consumers must tolerate
/// missing ids and names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Opaque id assigned by the model, unique within one assistant message
    #[serde(default)]
    pub id: Option<String>,

    /// Name of the tool to invoke
    #[serde(default)]
    pub name: Option<String>,

    /// Raw argument text, expected (but not guaranteed) to be a JSON object
    #[serde(default)]
    pub arguments: String,

    /// Call type discriminator
    #[serde(default)]
    pub kind: Option<ToolCallKind>,
}

impl ToolCallRequest {
    /// A fully specified function call.
    pub fn function(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: Some(id.into()),
            name: Some(name.into()),
            arguments: arguments.into(),
            kind: Some(ToolCallKind::Function),
        }
    }

    /// The tool name, or `""` if the stream never named it.
    pub fn name_or_empty(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}
