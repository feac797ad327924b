//! Exchange-level streaming events.
//!
//! `AgentStreamEvent` lifts raw stream tokens and tool dispatch into events a
//! front end can render live while an exchange is in flight.

use serde::{Deserialize, Serialize};

/// Events emitted by the tool-calling loop while an exchange runs.
///
/// - `chunk`       partial text token from the model
/// - `tool_call`   a tool is about to be invoked
/// - `tool_result` a tool call finished (successfully or not)
/// - `done`        the exchange produced its tool-free answer
/// - `error`       the exchange failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStreamEvent {
    /// Partial text token from the model.
    Chunk { content: String },

    /// The loop is calling a tool.
    ToolCall {
        id: Option<String>,
        name: String,
        input: serde_json::Value,
    },

    /// Tool execution completed. On failure `output` holds the error text
    /// that was handed back to the model.
    ToolResult {
        id: Option<String>,
        name: String,
        output: String,
        success: bool,
    },

    /// The exchange is complete.
    Done { rounds: u32, tool_calls_made: usize },

    /// The exchange failed.
    Error { message: String },
}

impl AgentStreamEvent {
    /// SSE-style event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_chunk() {
        let event = AgentStreamEvent::Chunk {
            content: "Hello".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"chunk""#));
        assert!(json.contains(r#""content":"Hello""#));
    }

    #[test]
    fn event_serialization_tool_call_without_id() {
        let event = AgentStreamEvent::ToolCall {
            id: None,
            name: "search_user".into(),
            input: serde_json::json!({"name": "Ada"}),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"tool_call""#));
        assert!(json.contains(r#""id":null"#));
        assert!(json.contains(r#""name":"search_user""#));
    }

    #[test]
    fn event_serialization_done() {
        let event = AgentStreamEvent::Done {
            rounds: 3,
            tool_calls_made: 2,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"done""#));
        assert!(json.contains(r#""rounds":3"#));
    }

    #[test]
    fn event_type_names() {
        assert_eq!(
            AgentStreamEvent::Chunk { content: "x".into() }.event_type(),
            "chunk"
        );
        assert_eq!(
            AgentStreamEvent::ToolResult {
                id: Some("call_1".into()),
                name: "b".into(),
                output: "c".into(),
                success: false
            }
            .event_type(),
            "tool_result"
        );
        assert_eq!(
            AgentStreamEvent::Error {
                message: "x".into()
            }
            .event_type(),
            "error"
        );
    }

    #[test]
    fn event_deserialization() {
        let json = r#"{"type":"tool_result","id":"call_1","name":"get_user_by_id","output":"ok","success":true}"#;
        let event: AgentStreamEvent = serde_json::from_str(json).unwrap();
        match event {
            AgentStreamEvent::ToolResult { id, success, .. } => {
                assert_eq!(id.as_deref(), Some("call_1"));
                assert!(success);
            }
            _ => panic!("Wrong variant"),
        }
    }
}
