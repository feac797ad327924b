//! Tool execution abstraction.
//!
//! [`ToolExecutor`] is the seam the agent loop dispatches through. The MCP
//! client implements it for remote tool hosts; tests implement it with
//! scripted executors.

use async_trait::async_trait;

use crate::error::ToolError;

/// Something that can run a named tool with JSON arguments.
///
/// The result is opaque to the caller beyond its textual rendering. Any
/// error is treated the same way regardless of cause.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError>;
}
