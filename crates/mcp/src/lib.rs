//! Model Context Protocol client for toolrelay.
//!
//! Connects to one MCP server over streamable HTTP using `rmcp`:
//! - initialize handshake, with the server's name and instructions kept
//! - `tools/list` (all pages) → the tool catalog handed to the model
//! - `tools/call` → [`McpClient`] implements `ToolExecutor`

pub mod client;

pub use client::McpClient;
