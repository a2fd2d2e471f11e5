//! Cross-thread control of a running agent.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use rivet_core::AgentState;
use tokio_util::sync::CancellationToken;

/// Cloneable handle for stopping a turn and observing the agent's state
/// from outside the task that drives it.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    token: Arc<Mutex<CancellationToken>>,
    state: Arc<AtomicU8>,
}

impl StopHandle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Cancel the turn in flight. The loop unwinds at its next checkpoint;
    /// a running subprocess is still bounded only by its own timeout.
    pub fn stop(&self) {
        self.current().cancel();
    }

    pub fn state(&self) -> AgentState {
        AgentState::try_from(self.state.load(Ordering::Acquire)).unwrap_or_default()
    }

    pub fn is_busy(&self) -> bool {
        self.state().is_busy()
    }

    /// Install a fresh token for a new turn and return it.
    pub(crate) fn arm(&self) -> CancellationToken {
        let fresh = CancellationToken::new();
        let mut slot = self.token.lock().unwrap_or_else(|p| p.into_inner());
        *slot = fresh.clone();
        fresh
    }

    pub(crate) fn set_state(&self, state: AgentState) -> AgentState {
        let previous = self.state.swap(state as u8, Ordering::AcqRel);
        AgentState::try_from(previous).unwrap_or_default()
    }

    fn current(&self) -> CancellationToken {
        self.token
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}
