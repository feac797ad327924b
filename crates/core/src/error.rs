//! Error types for the toolrelay domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Transport failures and tool failures are kept apart because the agent loop
//! treats them differently: tool errors are contained per call, transport
//! errors end the exchange.

use thiserror::Error;

/// Errors that end an exchange.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Exchange liveness ---
    #[error("Exchange exceeded round limit of {rounds} model calls")]
    RoundLimitExceeded { rounds: u32 },
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error(
        "Conflicting {field} for tool call at index {index}: {previous:?} then {incoming:?}"
    )]
    FragmentConflict {
        index: u32,
        field: &'static str,
        previous: String,
        incoming: String,
    },

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool host unreachable: {0}")]
    Transport(String),
}

impl ToolError {
    /// Error text to hand back to the model.
    ///
    /// A failure reported by the tool itself is passed through as-is; every
    /// other variant uses its full display text.
    pub fn detail(&self) -> String {
        match self {
            ToolError::ExecutionFailed { reason, .. } => reason.clone(),
            other => other.to_string(),
        }
    }
}
