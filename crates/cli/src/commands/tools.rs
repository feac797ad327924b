//! `toolrelay tools`: list the MCP server's tool catalog.

use toolrelay_core::provider::ToolDefinition;
use toolrelay_mcp::McpClient;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;

    let client = McpClient::connect(&config.mcp_url).await?;
    let tools = client.list_tools().await?;

    println!("🔧 Tools on {} ({})", client.server_name(), config.mcp_url);
    println!();
    if let Some(instructions) = client.instructions() {
        println!("  {instructions}");
        println!();
    }

    if tools.is_empty() {
        println!("  (no tools advertised)");
    }
    for tool in &tools {
        println!("{}", describe(tool));
    }

    Ok(())
}

/// One catalog entry: name, parameter names, description.
fn describe(tool: &ToolDefinition) -> String {
    let params: Vec<&str> = tool
        .parameters
        .get("properties")
        .and_then(serde_json::Value::as_object)
        .map(|props| props.keys().map(String::as_str).collect())
        .unwrap_or_default();

    let mut line = format!("  {}({})", tool.name, params.join(", "));
    if !tool.description.is_empty() {
        line.push_str(&format!("\n      {}", tool.description));
    }
    line
}
