//! # toolrelay Core
//!
//! Domain types, traits, and error definitions for the toolrelay
//! orchestrator. This crate has **no transport dependencies**; it defines
//! the domain model that the provider, MCP and agent crates implement against.
//!
//! ## Design Philosophy
//!
//! The two external collaborators of an exchange are defined as traits here:
//! - [`Provider`]: the streaming chat-completion transport
//! - [`ToolExecutor`]: the host that actually runs tools
//!
//! Implementations live in their respective crates, which keeps the agent
//! loop testable with scripted mocks.

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{Message, Role, ToolCallKind, ToolCallRequest};
pub use provider::{DeltaFragment, Provider, ProviderRequest, StreamChunk, ToolDefinition, Usage};
pub use tool::ToolExecutor;
