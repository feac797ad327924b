//! The tool-calling loop.
//!
//! One exchange alternates between two states:
//!
//! 1. **AwaitingAssistant**: stream a completion for the full history and
//!    rebuild the assistant message with a [`StreamAccumulator`]
//! 2. **ExecutingTools**: run every requested tool call in order, appending
//!    one tool-role message per call
//!
//! The exchange ends on the first assistant message without tool calls, or
//! fails once `max_rounds` completions have all asked for tools.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::mpsc::UnboundedSender;
use toolrelay_core::error::{Error, ProviderError};
use toolrelay_core::event::{DomainEvent, EventBus};
use toolrelay_core::message::{Message, ToolCallRequest};
use toolrelay_core::provider::{Provider, ProviderRequest, ToolDefinition};
use toolrelay_core::tool::ToolExecutor;
use tracing::{debug, info, warn};

use crate::accumulator::{MergePolicy, StreamAccumulator};
use crate::stream_event::AgentStreamEvent;

/// Completions allowed per exchange unless overridden.
pub const DEFAULT_MAX_ROUNDS: u32 = 25;

/// Result of [`ToolCallingLoop::exchange`].
#[derive(Debug, Clone)]
pub struct ExchangeOutcome {
    /// The final, tool-free assistant message
    pub message: Message,

    /// History after the exchange, without `message`
    pub history: Vec<Message>,

    /// Number of completions requested
    pub rounds: u32,
}

/// Drives exchanges between a completion transport and a tool executor.
pub struct ToolCallingLoop {
    /// The completion transport
    provider: Arc<dyn Provider>,

    /// Where tool calls are dispatched
    executor: Arc<dyn ToolExecutor>,

    /// Tool catalog sent unchanged on every round
    tools: Vec<ToolDefinition>,

    /// Model (or deployment) name
    model: String,

    /// Maximum completions per exchange
    max_rounds: u32,

    /// Conflict handling for streamed tool call fields
    merge_policy: MergePolicy,

    /// Event bus for domain events
    event_bus: Arc<EventBus>,

    /// Optional live event sink
    events: Option<UnboundedSender<AgentStreamEvent>>,
}

impl ToolCallingLoop {
    /// Create a loop over the given transport, executor and tool catalog.
    pub fn new(
        provider: Arc<dyn Provider>,
        executor: Arc<dyn ToolExecutor>,
        tools: Vec<ToolDefinition>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            executor,
            tools,
            model: model.into(),
            max_rounds: DEFAULT_MAX_ROUNDS,
            merge_policy: MergePolicy::default(),
            event_bus: Arc::new(EventBus::default()),
            events: None,
        }
    }

    /// Set the maximum number of completions per exchange (at least 1).
    pub fn with_max_rounds(mut self, max: u32) -> Self {
        self.max_rounds = max.max(1);
        self
    }

    pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merge_policy = policy;
        self
    }

    /// Publish domain events on a shared bus.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    /// Report live progress to `sender`.
    pub fn with_events(mut self, sender: UnboundedSender<AgentStreamEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Run one exchange over `history`.
    ///
    /// Assistant messages that request tools, and the tool results answering
    /// them, are appended to `history`. The final tool-free assistant message
    /// is returned without being appended.
    pub async fn run(&self, history: &mut Vec<Message>) -> Result<Message, Error> {
        self.drive(history).await.map(|(message, _)| message)
    }

    /// Run one exchange on an owned history.
    pub async fn exchange(&self, mut history: Vec<Message>) -> Result<ExchangeOutcome, Error> {
        let (message, rounds) = self.drive(&mut history).await?;
        Ok(ExchangeOutcome {
            message,
            history,
            rounds,
        })
    }

    async fn drive(&self, history: &mut Vec<Message>) -> Result<(Message, u32), Error> {
        info!(
            model = %self.model,
            messages = history.len(),
            tools = self.tools.len(),
            "Starting exchange"
        );

        let mut tool_calls_made = 0usize;

        for round in 1..=self.max_rounds {
            debug!(round, "Requesting completion");

            let message = match self.complete(history).await {
                Ok(message) => message,
                Err(e) => {
                    self.fail("completion", &e.to_string());
                    return Err(e.into());
                }
            };

            self.event_bus.publish(DomainEvent::RoundCompleted {
                round,
                tool_calls: message.tool_calls.len(),
                timestamp: Utc::now(),
            });

            if !message.has_tool_calls() {
                info!(rounds = round, tool_calls_made, "Exchange completed");
                self.event_bus.publish(DomainEvent::ExchangeCompleted {
                    rounds: round,
                    tool_calls_made,
                    timestamp: Utc::now(),
                });
                self.emit(AgentStreamEvent::Done {
                    rounds: round,
                    tool_calls_made,
                });
                return Ok((message, round));
            }

            debug!(
                round,
                tool_count = message.tool_calls.len(),
                "Executing tool calls"
            );

            let calls = message.tool_calls.clone();
            history.push(message);

            // Sequential on purpose: results must land in request order.
            for call in &calls {
                let content = self.dispatch(call).await;
                history.push(Message::tool_result(call.id.clone(), content));
                tool_calls_made += 1;
            }
        }

        warn!(
            max_rounds = self.max_rounds,
            tool_calls_made, "Round limit reached without a final answer"
        );
        let err = Error::RoundLimitExceeded {
            rounds: self.max_rounds,
        };
        self.fail("exchange", &err.to_string());
        Err(err)
    }

    /// Stream one completion and rebuild the assistant message.
    async fn complete(&self, history: &[Message]) -> Result<Message, ProviderError> {
        let request =
            ProviderRequest::streaming(&self.model, history.to_vec(), self.tools.clone());
        let receiver = self.provider.stream(request).await?;

        StreamAccumulator::new(self.merge_policy)
            .collect(receiver, |token| {
                self.emit(AgentStreamEvent::Chunk {
                    content: token.to_string(),
                })
            })
            .await
    }

    /// Execute one tool call and return the text for its tool-role message.
    ///
    /// Never fails: executor errors become an error description the model
    /// can read.
    async fn dispatch(&self, call: &ToolCallRequest) -> String {
        let name = call.name_or_empty();
        let arguments = parse_arguments(&call.arguments);

        self.emit(AgentStreamEvent::ToolCall {
            id: call.id.clone(),
            name: name.to_string(),
            input: arguments.clone(),
        });

        let start = Instant::now();
        let result = self.executor.execute(name, arguments).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let (content, success) = match result {
            Ok(value) => {
                debug!(tool = %name, duration_ms, "Tool call succeeded");
                (result_text(value), true)
            }
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool execution failed");
                (format!("Error during `{name}` call: {}", e.detail()), false)
            }
        };

        self.event_bus.publish(DomainEvent::ToolExecuted {
            tool_name: name.to_string(),
            success,
            duration_ms,
            timestamp: Utc::now(),
        });
        self.emit(AgentStreamEvent::ToolResult {
            id: call.id.clone(),
            name: name.to_string(),
            output: content.clone(),
            success,
        });

        content
    }

    fn emit(&self, event: AgentStreamEvent) {
        if let Some(sender) = &self.events {
            // A dropped receiver just means nobody is watching
            let _ = sender.send(event);
        }
    }

    fn fail(&self, context: &str, message: &str) {
        self.event_bus.publish(DomainEvent::ErrorOccurred {
            context: context.to_string(),
            error_message: message.to_string(),
            timestamp: Utc::now(),
        });
        self.emit(AgentStreamEvent::Error {
            message: message.to_string(),
        });
    }
}

/// Parse streamed argument text for dispatch.
///
/// Blank text means no arguments. Text that is not valid JSON is replaced by
/// an empty object instead of failing the call.
pub fn parse_arguments(raw: &str) -> serde_json::Value {
    let raw = raw.trim();
    if raw.is_empty() {
        return serde_json::Value::Object(serde_json::Map::new());
    }
    serde_json::from_str(raw).unwrap_or_else(|e| {
        debug!(error = %e, "Malformed tool arguments, sending {{}}");
        serde_json::Value::Object(serde_json::Map::new())
    })
}

/// Render an executor result as tool message content.
pub fn result_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text,
        other => other.to_string(),
    }
}
