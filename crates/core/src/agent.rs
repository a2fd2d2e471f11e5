//! Agent lifecycle state.

use serde::{Deserialize, Serialize};

/// Observable state of the agent loop.
///
/// Reported through state-change events; the loop's own counters, not this
/// value, drive control flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum AgentState {
    #[default]
    Idle = 0,
    Thinking = 1,
    CallingTool = 2,
    WaitingForUser = 3,
    Error = 4,
    Done = 5,
}

impl AgentState {
    /// True while a turn is in flight.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            Self::Thinking | Self::CallingTool | Self::WaitingForUser
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Thinking => "thinking",
            Self::CallingTool => "calling_tool",
            Self::WaitingForUser => "waiting_for_user",
            Self::Error => "error",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u8> for AgentState {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        Ok(match value {
            0 => Self::Idle,
            1 => Self::Thinking,
            2 => Self::CallingTool,
            3 => Self::WaitingForUser,
            4 => Self::Error,
            5 => Self::Done,
            other => return Err(other),
        })
    }
}
