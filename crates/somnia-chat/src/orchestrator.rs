//! Chat orchestrator: the write path for a single conversational turn.
//!
//! A turn validates input, resolves or creates the conversation, builds the
//! bounded context, persists the user message, calls the LLM through the
//! retry policy, and persists the reply (or the fallback). No store lock is
//! held while the LLM call is in flight; each store access is its own
//! atomic operation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use somnia_core::config::{ChatConfig, LlmConfig};
use somnia_core::types::{Conversation, Message, NewMessage, TopicLabel};
use somnia_storage::ConversationStore;

use crate::classifier::TopicClassifier;
use crate::context::ContextWindow;
use crate::error::ChatError;
use crate::llm::LlmClient;
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::turn::{TurnState, TurnTracker};

/// Longest accepted user id.
const MAX_USER_ID_LENGTH: usize = 128;

/// Result of a completed or degraded turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnOutcome {
    pub conversation_id: Uuid,
    pub assistant_text: String,
    /// Creation time of the persisted assistant message.
    pub timestamp: DateTime<Utc>,
    /// Topic assigned to the user message.
    pub topic: TopicLabel,
    pub state: TurnState,
}

impl TurnOutcome {
    pub fn is_degraded(&self) -> bool {
        self.state == TurnState::Degraded
    }
}

/// A conversation with its messages in sequence order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationHistory {
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

/// Coordinates store, classifier, context window, and LLM for each turn.
pub struct ChatOrchestrator {
    store: Arc<dyn ConversationStore>,
    llm: Arc<dyn LlmClient>,
    sleeper: Arc<dyn Sleeper>,
    classifier: TopicClassifier,
    window: ContextWindow,
    retry: RetryPolicy,
    config: ChatConfig,
}

impl ChatOrchestrator {
    pub fn new(
        config: &ChatConfig,
        llm_config: &LlmConfig,
        store: Arc<dyn ConversationStore>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            store,
            llm,
            sleeper: Arc::new(TokioSleeper),
            classifier: TopicClassifier::new(),
            window: ContextWindow::new(
                config.context_turns,
                config.context_char_budget,
                config.system_prompt.clone(),
            ),
            retry: RetryPolicy::from_config(llm_config),
            config: config.clone(),
        }
    }

    /// Replace the sleeper used between retry attempts.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Handle one user message.
    ///
    /// Input errors are returned before anything is written. Once the user
    /// message is persisted it stays persisted, even if this future is
    /// dropped before the reply is written. LLM failures never surface as
    /// errors: after the retry budget is spent the fallback reply is stored
    /// with `is_error = true` and the turn ends `Degraded`.
    pub async fn handle_turn(
        &self,
        conversation_id: Option<Uuid>,
        user_id: &str,
        text: &str,
    ) -> Result<TurnOutcome, ChatError> {
        self.validate(user_id, text)?;
        let mut turn = TurnTracker::new();

        let conversation = self.resolve_conversation(conversation_id, user_id)?;
        let history = self.store.get_messages(conversation.id)?;
        let context = self.window.build(&history, text);
        turn.advance(TurnState::ContextBuilt)?;
        debug!(
            conversation_id = %conversation.id,
            history = history.len(),
            context_turns = context.turns.len(),
            "Context built"
        );

        let topic = self.classifier.classify(text);
        self.store
            .append_message(NewMessage::user(conversation.id, text, topic))?;
        turn.advance(TurnState::Dispatched)?;

        let llm = Arc::clone(&self.llm);
        let reply = self
            .retry
            .run(self.sleeper.as_ref(), |_| llm.generate(&context))
            .await;

        let (assistant_text, is_error) = match reply {
            Ok(text) => {
                turn.advance(TurnState::Completed)?;
                (text, false)
            }
            Err(e) => {
                warn!(
                    conversation_id = %conversation.id,
                    attempts = e.attempts,
                    error = %e.last_error,
                    "LLM unavailable, replying with fallback"
                );
                turn.advance(TurnState::Degraded)?;
                (self.config.fallback_response.clone(), true)
            }
        };

        let assistant = self.store.append_message(NewMessage::assistant(
            conversation.id,
            assistant_text,
            is_error,
        ))?;

        info!(
            conversation_id = %conversation.id,
            topic = %topic,
            state = ?turn.state(),
            "Turn finished"
        );

        Ok(TurnOutcome {
            conversation_id: conversation.id,
            assistant_text: assistant.content,
            timestamp: assistant.created_at,
            topic,
            state: turn.state(),
        })
    }

    /// Load a conversation and its messages.
    ///
    /// When `user_id` is given, the conversation must belong to that user.
    pub fn conversation_history(
        &self,
        conversation_id: Uuid,
        user_id: Option<&str>,
    ) -> Result<ConversationHistory, ChatError> {
        let conversation = self
            .store
            .get_conversation(conversation_id)?
            .ok_or(ChatError::ConversationNotFound(conversation_id))?;

        if let Some(user_id) = user_id {
            if conversation.owner_user_id != user_id {
                return Err(ChatError::ConversationOwnerMismatch(conversation_id));
            }
        }

        let messages = self.store.get_messages(conversation_id)?;
        Ok(ConversationHistory {
            conversation,
            messages,
        })
    }

    /// Topics the classifier can assign, excluding the fallback.
    pub fn available_topics(&self) -> Vec<TopicLabel> {
        self.classifier.topics()
    }

    fn validate(&self, user_id: &str, text: &str) -> Result<(), ChatError> {
        if !self.config.enabled {
            return Err(ChatError::Disabled);
        }

        let trimmed = user_id.trim();
        if trimmed.is_empty()
            || trimmed.len() != user_id.len()
            || user_id.chars().count() > MAX_USER_ID_LENGTH
            || user_id.chars().any(char::is_control)
        {
            return Err(ChatError::InvalidUserId(user_id.to_string()));
        }

        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if text.chars().count() > self.config.max_message_chars {
            return Err(ChatError::MessageTooLong(self.config.max_message_chars));
        }
        Ok(())
    }

    /// Existing conversation owned by `user_id`, or a new one when the id is
    /// absent or unknown.
    fn resolve_conversation(
        &self,
        conversation_id: Option<Uuid>,
        user_id: &str,
    ) -> Result<Conversation, ChatError> {
        if let Some(id) = conversation_id {
            match self.store.get_conversation(id)? {
                Some(conversation) if conversation.owner_user_id == user_id => {
                    return Ok(conversation)
                }
                Some(_) => return Err(ChatError::ConversationOwnerMismatch(id)),
                None => {
                    debug!(conversation_id = %id, "Unknown conversation, starting a new one");
                }
            }
        }

        let conversation = self.store.create_conversation(user_id)?;
        info!(conversation_id = %conversation.id, "Conversation started");
        Ok(conversation)
    }
}
