//! The rivet agent loop.
//!
//! The agent follows a **generate → act → observe** cycle:
//!
//! 1. **Receive** a user message, optionally with images
//! 2. **Generate** from the system prompt, the capability prompt and the
//!    full history
//! 3. **Parse** `<tool_call>` blocks out of the response
//! 4. **If tool calls**: run them in order, append the results as one Tool
//!    turn, loop back to step 2
//! 5. **If plain text**: that is the answer
//!
//! The loop also stops on too many failed tool calls in a row, on the
//! iteration bound and on [`StopHandle::stop`].

pub mod agent;
pub mod control;
pub mod parser;
pub mod stream_event;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use agent::{Agent, AgentBuilder, ITERATION_LIMIT_MARKER, StopReason, TurnResult};
pub use control::StopHandle;
pub use parser::{ParsedResponse, ToolCallParser, format_tool_results, strip_markers};
pub use stream_event::AgentEvent;
