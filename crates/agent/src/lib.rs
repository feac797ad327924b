//! The tool-calling core of toolrelay.
//!
//! An exchange follows a **Stream → Dispatch → Extend** cycle:
//!
//! 1. **Stream** the history and tool catalog to the completion transport
//! 2. **Accumulate** content tokens and tool call fragments into one
//!    assistant message
//! 3. **If tool calls**: execute each through the `ToolExecutor`, append the
//!    results, loop back to step 1
//! 4. **If text only**: return the message to the caller
//!
//! Tool failures are turned into tool-role messages and never end the
//! exchange. Transport failures and the round limit do.

pub mod accumulator;
pub mod loop_runner;
pub mod stream_event;

pub use accumulator::{MergePolicy, StreamAccumulator};
pub use loop_runner::{DEFAULT_MAX_ROUNDS, ExchangeOutcome, ToolCallingLoop};
pub use stream_event::AgentStreamEvent;
