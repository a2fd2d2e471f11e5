//! Events emitted while a turn runs.
//!
//! The embedding application receives these over an mpsc channel installed
//! with [`AgentBuilder::event_sink`](crate::AgentBuilder::event_sink) and
//! can render, log or forward them however it likes.

use rivet_core::{AgentState, ToolArgs};
use serde::{Deserialize, Serialize};

use crate::agent::StopReason;

/// Lifecycle and streaming events.
///
/// - `token`        partial text from the backend, in generation order
/// - `tool_call`    a call is about to be dispatched
/// - `tool_result`  the call finished
/// - `state_changed` the agent moved to a new state
/// - `done`         the turn is over
/// - `error`        the backend failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    Token {
        content: String,
    },

    ToolCall {
        id: String,
        name: String,
        arguments: ToolArgs,
    },

    ToolResult {
        id: String,
        name: String,
        success: bool,
        output: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    StateChanged {
        state: AgentState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },

    Done {
        iterations: usize,
        tool_calls_made: usize,
        stop_reason: StopReason,
    },

    Error {
        message: String,
    },
}

impl AgentEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Token { .. } => "token",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::StateChanged { .. } => "state_changed",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_serialization() {
        let event = AgentEvent::Token {
            content: "Hello".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"token","content":"Hello"}"#);
    }

    #[test]
    fn state_change_serialization() {
        let event = AgentEvent::StateChanged {
            state: AgentState::CallingTool,
            note: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"state_changed","state":"calling_tool"}"#);
    }

    #[test]
    fn tool_call_carries_arguments() {
        let event = AgentEvent::ToolCall {
            id: "call_0".into(),
            name: "shell".into(),
            arguments: [("command", "ls")].into_iter().collect(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "tool_call");
        assert_eq!(json["arguments"]["command"], "ls");
    }

    #[test]
    fn done_round_trips() {
        let json = r#"{"type":"done","iterations":2,"tool_calls_made":1,"stop_reason":"iteration_limit"}"#;
        let event: AgentEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            AgentEvent::Done {
                iterations: 2,
                tool_calls_made: 1,
                stop_reason: StopReason::IterationLimit,
            }
        );
        assert_eq!(event.event_type(), "done");
    }
}
