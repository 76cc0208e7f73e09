//! Conversational core for Somnia.
//!
//! Classifies user messages into the sleep-science topic taxonomy, builds
//! bounded LLM context from the conversation log, calls the LLM with
//! bounded retries, and persists every turn through the store.

pub mod classifier;
pub mod context;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod retry;
pub mod turn;

#[cfg(test)]
pub(crate) mod testing;

pub use classifier::TopicClassifier;
pub use context::{ChatContext, ChatTurn, ContextWindow};
pub use error::ChatError;
pub use llm::{HttpLlmClient, LlmClient, LlmError};
pub use orchestrator::{ChatOrchestrator, ConversationHistory, TurnOutcome};
pub use retry::{RetryError, RetryPolicy, Sleeper, TokioSleeper};
pub use turn::{TurnState, TurnTracker};
