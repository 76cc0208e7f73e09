//! Application state shared across all route handlers.

use std::sync::Arc;

use somnia_chat::{ChatOrchestrator, LlmClient};
use somnia_core::config::SomniaConfig;
use somnia_insight::AnalyticsAggregator;
use somnia_storage::{ConversationStore, Database, SqliteConversationStore};

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<SomniaConfig>,
    /// Write path for chat turns.
    pub orchestrator: Arc<ChatOrchestrator>,
    /// Read path for analytics.
    pub analytics: Arc<AnalyticsAggregator>,
}

impl AppState {
    /// Wire the store, orchestrator, and aggregator over one database.
    pub fn new(config: SomniaConfig, database: Database, llm: Arc<dyn LlmClient>) -> Self {
        let store: Arc<dyn ConversationStore> =
            Arc::new(SqliteConversationStore::new(Arc::new(database)));
        let orchestrator =
            ChatOrchestrator::new(&config.chat, &config.llm, Arc::clone(&store), llm);
        let analytics = AnalyticsAggregator::new(Arc::clone(&store), config.analytics.clone());

        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            analytics: Arc::new(analytics),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use somnia_chat::{ChatContext, LlmError};

    struct EchoLlm;

    #[async_trait]
    impl LlmClient for EchoLlm {
        async fn generate(&self, context: &ChatContext) -> Result<String, LlmError> {
            Ok(format!("echo: {}", context.turns.len()))
        }
    }

    #[tokio::test]
    async fn test_orchestrator_and_analytics_share_one_store() {
        let state = AppState::new(
            SomniaConfig::default(),
            Database::in_memory().unwrap(),
            Arc::new(EchoLlm),
        );

        let outcome = state
            .orchestrator
            .handle_turn(None, "alice", "how much sleep do I need?")
            .await
            .unwrap();

        let summary = state
            .analytics
            .conversation_summary(outcome.conversation_id)
            .unwrap();
        assert_eq!(summary.user_id, "alice");
        assert_eq!(summary.total_messages, 2);
        assert_eq!(state.analytics.overview(1).unwrap().total_interactions, 1);
    }
}
