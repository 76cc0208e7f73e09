//! Error types for the conversational core.

use somnia_core::error::SomniaError;
use uuid::Uuid;

use crate::turn::TurnState;

/// Errors from the chat engine.
///
/// Validation variants are raised before anything is persisted. LLM failures
/// never appear here: they degrade the turn instead.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("chat is disabled")]
    Disabled,
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("invalid user id: {0}")]
    InvalidUserId(String),
    #[error("conversation {0} belongs to another user")]
    ConversationOwnerMismatch(Uuid),
    #[error("conversation not found: {0}")]
    ConversationNotFound(Uuid),
    #[error("invalid turn transition: {0:?} -> {1:?}")]
    InvalidTransition(TurnState, TurnState),
    #[error("storage error: {0}")]
    Storage(String),
}

impl ChatError {
    /// True for errors caused by the caller's input.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ChatError::EmptyMessage
                | ChatError::MessageTooLong(_)
                | ChatError::InvalidUserId(_)
                | ChatError::ConversationOwnerMismatch(_)
                | ChatError::ConversationNotFound(_)
        )
    }
}

impl From<SomniaError> for ChatError {
    fn from(err: SomniaError) -> Self {
        ChatError::Storage(err.to_string())
    }
}
