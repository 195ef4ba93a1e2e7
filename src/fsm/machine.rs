//! Per-agent state machine with strict transition checking

use serde::{Deserialize, Serialize};

use crate::core::error::{AiError, Result};
use crate::core::types::AgentId;
use crate::fsm::state::AgentState;

/// A state change that was applied
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub agent: AgentId,
    pub from: AgentState,
    pub to: AgentState,
    /// Simulation time (seconds) the change happened
    pub at: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateMachine {
    state: AgentState,
    previous: Option<AgentState>,
    entered_at: f32,
    invalid_transitions: u32,
}

impl StateMachine {
    pub fn new(initial: AgentState, now: f32) -> Self {
        Self {
            state: initial,
            previous: None,
            entered_at: now,
            invalid_transitions: 0,
        }
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn previous(&self) -> Option<AgentState> {
        self.previous
    }

    pub fn time_in_state(&self, now: f32) -> f32 {
        (now - self.entered_at).max(0.0)
    }

    /// Rejected requests since creation
    pub fn invalid_transitions(&self) -> u32 {
        self.invalid_transitions
    }

    /// Move to `to` if the table allows it
    ///
    /// An illegal request leaves the state untouched, bumps the counter and
    /// returns `InvalidTransition`.
    pub fn request(&mut self, agent: AgentId, to: AgentState, now: f32) -> Result<Transition> {
        let from = self.state;
        if !from.can_transition_to(to) {
            self.invalid_transitions += 1;
            tracing::warn!(%agent, ?from, ?to, "rejected invalid state transition");
            return Err(AiError::InvalidTransition { agent, from, to });
        }

        self.previous = Some(from);
        self.state = to;
        self.entered_at = now;
        Ok(Transition { agent, from, to, at: now })
    }
}
