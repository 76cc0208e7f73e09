//! Context window construction.
//!
//! Turns a conversation's stored history plus the incoming user message into
//! the bounded context sent to the LLM: a fixed system preamble followed by
//! the most recent turns that fit both the turn limit and the char budget.

use serde::Serialize;

use somnia_core::types::{Message, Role};

/// A single role/content pair sent to the LLM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

impl From<&Message> for ChatTurn {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// Everything the LLM sees for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatContext {
    pub system: String,
    /// Oldest first. Always ends with the current user message.
    pub turns: Vec<ChatTurn>,
}

impl ChatContext {
    /// Characters across all turns, excluding the system preamble.
    pub fn char_count(&self) -> usize {
        self.turns.iter().map(ChatTurn::char_len).sum()
    }
}

// =============================================================================
// ContextWindow
// =============================================================================

/// Builds bounded contexts from conversation history.
#[derive(Debug, Clone)]
pub struct ContextWindow {
    /// Maximum turns in a context, counting the current user message.
    pub max_turns: usize,
    /// Maximum characters across all turns.
    pub char_budget: usize,
    pub system_prompt: String,
}

impl ContextWindow {
    pub fn new(max_turns: usize, char_budget: usize, system_prompt: impl Into<String>) -> Self {
        Self {
            max_turns: max_turns.max(1),
            char_budget,
            system_prompt: system_prompt.into(),
        }
    }

    /// Build the context for a new user message.
    ///
    /// `history` is the conversation in sequence order, not including
    /// `current`. The result keeps the newest turns: first the turn limit is
    /// applied, then the oldest turns are dropped while the total exceeds
    /// the char budget, and finally leading assistant turns are removed so
    /// the context opens with a user turn. The current message is never
    /// dropped.
    pub fn build(&self, history: &[Message], current: &str) -> ChatContext {
        let current = ChatTurn::user(current);
        let mut used = current.char_len();

        // Walk history newest-first, keeping turns while both limits hold.
        let mut kept: Vec<ChatTurn> = Vec::new();
        for message in history.iter().rev() {
            if kept.len() + 1 >= self.max_turns {
                break;
            }
            let turn = ChatTurn::from(message);
            let len = turn.char_len();
            if used + len > self.char_budget {
                break;
            }
            used += len;
            kept.push(turn);
        }
        kept.reverse();

        let first_user = kept
            .iter()
            .position(|t| t.role == Role::User)
            .unwrap_or(kept.len());
        kept.drain(..first_user);
        kept.push(current);

        ChatContext {
            system: self.system_prompt.clone(),
            turns: kept,
        }
    }
}
