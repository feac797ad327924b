//! `toolrelay chat`: interactive or single-message chat mode.

use std::io::Write;
use std::sync::Arc;

use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use toolrelay_agent::{AgentStreamEvent, ToolCallingLoop};
use toolrelay_config::AppConfig;
use toolrelay_core::message::Message;
use toolrelay_mcp::McpClient;
use tracing::debug;

use crate::prompt;

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;

    // Check for API key early; give a clear error
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    TOOLRELAY_API_KEY       (generic)");
        eprintln!("    OPENAI_API_KEY          (for OpenAI direct)");
        eprintln!("    AZURE_OPENAI_API_KEY    (for Azure OpenAI)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider = toolrelay_providers::build_from_config(&config)?;
    let mcp = Arc::new(
        McpClient::connect(&config.mcp_url)
            .await
            .map_err(|e| format!("Cannot reach MCP server at {}: {e}", config.mcp_url))?,
    );
    let tools = mcp.list_tools().await?;
    let tool_count = tools.len();

    let (events_tx, mut events) = mpsc::unbounded_channel();
    let agent = ToolCallingLoop::new(provider, mcp.clone(), tools, &config.model)
        .with_max_rounds(config.max_rounds)
        .with_merge_policy(super::merge_policy(config.merge_policy))
        .with_events(events_tx);

    let mut history = vec![Message::system(prompt::system_prompt(
        config.system_prompt.as_deref(),
    ))];

    if let Some(msg) = message {
        // Single message mode
        history.push(Message::user(msg));
        turn(&agent, &mut history, &mut events).await?;
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  toolrelay chat");
    println!();
    println!("  Model:     {}", config.model);
    println!("  MCP:       {} ({})", mcp.server_name(), config.mcp_url);
    println!("  Tools:     {tool_count}");
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or 'quit' to leave.");
    println!();

    let mut lines = BufReader::new(io::stdin()).lines();

    loop {
        print!("👤: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        history.push(Message::user(line));
        match turn(&agent, &mut history, &mut events).await {
            Ok(answer) => history.push(answer),
            Err(e) => {
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    println!();
    println!("  Goodbye! 👋");
    println!();

    Ok(())
}

/// Run one exchange, rendering its events as they arrive.
async fn turn(
    agent: &ToolCallingLoop,
    history: &mut Vec<Message>,
    events: &mut UnboundedReceiver<AgentStreamEvent>,
) -> Result<Message, toolrelay_core::Error> {
    let mut renderer = Renderer::default();
    let mut out = std::io::stdout();

    let result = {
        let exchange = agent.run(history);
        tokio::pin!(exchange);
        loop {
            tokio::select! {
                result = &mut exchange => break result,
                Some(event) = events.recv() => renderer.render(&event, &mut out),
            }
        }
    };

    while let Ok(event) = events.try_recv() {
        renderer.render(&event, &mut out);
    }
    result
}

/// Terminal rendering of one exchange. Each completion round's text starts
/// on its own `🤖: ` line.
struct Renderer {
    round_start: bool,
}

impl Default for Renderer {
    fn default() -> Self {
        Self { round_start: true }
    }
}

impl Renderer {
    fn render(&mut self, event: &AgentStreamEvent, out: &mut impl Write) {
        let _ = self.write(event, out);
        let _ = out.flush();
    }

    fn write(&mut self, event: &AgentStreamEvent, out: &mut impl Write) -> std::io::Result<()> {
        match event {
            AgentStreamEvent::Chunk { content } => {
                if self.round_start {
                    write!(out, "🤖: ")?;
                    self.round_start = false;
                }
                write!(out, "{content}")?;
            }
            AgentStreamEvent::ToolCall { name, input, .. } => {
                debug!(tool = %name, %input, "Calling tool");
            }
            AgentStreamEvent::ToolResult {
                success, output, ..
            } => {
                if !self.round_start {
                    writeln!(out)?;
                    self.round_start = true;
                }
                if !success {
                    writeln!(out, "  ⚠️  {output}")?;
                }
            }
            AgentStreamEvent::Done { .. } => writeln!(out, "\n")?,
            AgentStreamEvent::Error { .. } => writeln!(out)?,
        }
        Ok(())
    }
}
