//! Fakes shared by this crate's unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::context::ChatContext;
use crate::llm::{LlmClient, LlmError};
use crate::retry::Sleeper;

/// Records requested delays without waiting.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

/// Replays scripted results in order, then repeats `fallback`.
pub struct ScriptedLlm {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    fallback: Result<String, LlmError>,
    seen: Mutex<Vec<ChatContext>>,
}

impl ScriptedLlm {
    pub fn replying(text: &str) -> Self {
        Self::new(Vec::new(), Ok(text.to_string()))
    }

    pub fn failing(error: LlmError) -> Self {
        Self::new(Vec::new(), Err(error))
    }

    pub fn new(
        script: Vec<Result<String, LlmError>>,
        fallback: Result<String, LlmError>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Contexts received, one per attempt.
    pub fn seen(&self) -> Vec<ChatContext> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn generate(&self, context: &ChatContext) -> Result<String, LlmError> {
        self.seen.lock().unwrap().push(context.clone());
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

/// Holds back the reply to one message until `release` is called. Every
/// other message is answered at once.
pub struct GatedLlm {
    held_message: String,
    entered: Notify,
    gate: Notify,
}

impl GatedLlm {
    pub fn holding(message: &str) -> Self {
        Self {
            held_message: message.to_string(),
            entered: Notify::new(),
            gate: Notify::new(),
        }
    }

    /// Resolves once the held message has reached the model.
    pub async fn wait_until_held(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl LlmClient for GatedLlm {
    async fn generate(&self, context: &ChatContext) -> Result<String, LlmError> {
        let current = context.turns.last().map(|t| t.content.as_str());
        if current == Some(self.held_message.as_str()) {
            self.entered.notify_one();
            self.gate.notified().await;
            return Ok("slow reply".to_string());
        }
        Ok("fast reply".to_string())
    }
}
