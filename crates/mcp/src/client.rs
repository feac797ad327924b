//! Streamable-HTTP client for a single MCP server.

use async_trait::async_trait;
use rmcp::model::{CallToolRequestParams, Content, Tool};
use rmcp::service::RunningService;
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::{RoleClient, ServiceError, ServiceExt};
use toolrelay_core::error::ToolError;
use toolrelay_core::provider::ToolDefinition;
use toolrelay_core::tool::ToolExecutor;
use tracing::{debug, info};

/// A connected MCP session.
///
/// Construct with [`McpClient::connect`], which performs the initialize
/// handshake. The client is then read-only and can be shared behind an `Arc`.
pub struct McpClient {
    service: RunningService<RoleClient, ()>,
}

impl McpClient {
    /// Connect to the server at `url` and run the initialize handshake.
    pub async fn connect(url: impl Into<String>) -> Result<Self, ToolError> {
        let url = url.into();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ToolError::Transport(format!(
                "Only HTTP/HTTPS URLs are supported: {url}"
            )));
        }

        let transport = StreamableHttpClientTransport::from_uri(url.as_str());
        let service = ()
            .serve(transport)
            .await
            .map_err(|e| ToolError::Transport(format!("initialize {url}: {e}")))?;

        let client = Self { service };
        info!(server = %client.server_name(), %url, "Connected to MCP server");
        Ok(client)
    }

    /// Name reported by the server during initialize.
    pub fn server_name(&self) -> &str {
        self.service
            .peer_info()
            .map(|info| info.server_info.name.as_str())
            .unwrap_or_default()
    }

    /// Usage instructions the server advertised, if any.
    pub fn instructions(&self) -> Option<&str> {
        self.service
            .peer_info()
            .and_then(|info| info.instructions.as_deref())
    }

    /// Fetch the full tool catalog across every page.
    pub async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ToolError> {
        let tools = self
            .service
            .peer()
            .list_all_tools()
            .await
            .map_err(|e| ToolError::Transport(format!("tools/list: {e}")))?;

        debug!(count = tools.len(), "Listed MCP tools");
        Ok(tools.iter().map(tool_definition).collect())
    }

    /// Invoke a tool and return its text output.
    ///
    /// MCP arguments are an object; any other JSON value is sent as absent.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<String, ToolError> {
        let result = self
            .service
            .peer()
            .call_tool(CallToolRequestParams {
                name: name.to_string().into(),
                arguments: arguments.as_object().cloned(),
                meta: None,
                task: None,
            })
            .await
            .map_err(|e| match e {
                ServiceError::McpError(data) => ToolError::ExecutionFailed {
                    tool_name: name.to_string(),
                    reason: data.message.to_string(),
                },
                other => ToolError::Transport(format!("tools/call {name}: {other}")),
            })?;

        let text = content_text(&result.content);
        if result.is_error == Some(true) {
            return Err(ToolError::ExecutionFailed {
                tool_name: name.to_string(),
                reason: text,
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl ToolExecutor for McpClient {
    async fn execute(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        self.call_tool(name, arguments)
            .await
            .map(serde_json::Value::String)
    }
}

/// Catalog entry as the model sees it. An empty schema becomes an empty
/// object schema.
fn tool_definition(tool: &Tool) -> ToolDefinition {
    let parameters = if tool.input_schema.is_empty() {
        serde_json::json!({"type": "object", "properties": {}})
    } else {
        serde_json::Value::Object((*tool.input_schema).clone())
    };
    ToolDefinition {
        name: tool.name.to_string(),
        description: tool.description.as_deref().unwrap_or_default().to_string(),
        parameters,
    }
}

/// Text items verbatim, anything else as its JSON form, one per line.
fn content_text(content: &[Content]) -> String {
    content
        .iter()
        .map(|c| match c.raw.as_text() {
            Some(t) => t.text.clone(),
            None => serde_json::to_string(&c.raw).unwrap_or_default(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
