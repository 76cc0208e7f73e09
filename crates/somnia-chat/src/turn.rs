//! Turn lifecycle with validated transitions.
//!
//! Received -> ContextBuilt -> Dispatched -> Completed | Degraded
//!
//! Both terminal states are successful outcomes for the caller.

use serde::Serialize;

use crate::error::ChatError;

/// Lifecycle state of a single chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    /// Input validated, conversation not yet touched.
    Received,
    /// History loaded and truncated.
    ContextBuilt,
    /// User message persisted, LLM call in flight.
    Dispatched,
    /// LLM reply persisted.
    Completed,
    /// Fallback reply persisted after all attempts failed.
    Degraded,
}

impl TurnState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Completed | TurnState::Degraded)
    }
}

/// Validate that a turn state transition is allowed.
pub fn validate_transition(from: TurnState, to: TurnState) -> Result<(), ChatError> {
    let valid = matches!(
        (from, to),
        (TurnState::Received, TurnState::ContextBuilt)
            | (TurnState::ContextBuilt, TurnState::Dispatched)
            | (TurnState::Dispatched, TurnState::Completed)
            | (TurnState::Dispatched, TurnState::Degraded)
    );

    if valid {
        Ok(())
    } else {
        Err(ChatError::InvalidTransition(from, to))
    }
}

/// Tracks the current state of one turn.
#[derive(Debug)]
pub struct TurnTracker {
    state: TurnState,
}

impl Default for TurnTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnTracker {
    pub fn new() -> Self {
        Self {
            state: TurnState::Received,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn advance(&mut self, next: TurnState) -> Result<(), ChatError> {
        validate_transition(self.state, next)?;
        self.state = next;
        Ok(())
    }
}
