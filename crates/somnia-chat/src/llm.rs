//! LLM client abstraction and the HTTP implementation.
//!
//! The orchestrator only sees `LlmClient`; the HTTP client speaks the
//! Anthropic messages format with `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use somnia_core::config::LlmConfig;

use crate::context::ChatContext;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Failure of a single LLM attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LlmError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("upstream returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("LLM client is not configured: {0}")]
    NotConfigured(String),
}

impl LlmError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Timeout(_) | LlmError::Transport(_) => true,
            LlmError::Status { status, .. } => *status == 429 || *status >= 500,
            LlmError::InvalidResponse(_) | LlmError::NotConfigured(_) => false,
        }
    }
}

/// Text generation backend.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, context: &ChatContext) -> Result<String, LlmError>;
}

// =============================================================================
// HttpLlmClient
// =============================================================================

/// Calls a hosted model over the messages API.
pub struct HttpLlmClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
}

impl HttpLlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let timeout = Duration::from_secs(config.request_timeout_secs.max(1));
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::NotConfigured(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout,
        })
    }

    fn build_request(&self, context: &ChatContext) -> CreateMessageRequest {
        CreateMessageRequest {
            model: self.model.clone(),
            system: context.system.clone(),
            messages: context
                .turns
                .iter()
                .map(|t| RequestMessage {
                    role: t.role.as_str(),
                    content: t.content.clone(),
                })
                .collect(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn generate(&self, context: &ChatContext) -> Result<String, LlmError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::NotConfigured("no API key".to_string()))?;

        let body = self.build_request(context);
        debug!(model = %self.model, turns = body.messages.len(), "Sending LLM request");

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    LlmError::Timeout(self.timeout)
                } else {
                    LlmError::Transport(err.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body_text));
        }

        let parsed: CreateMessageResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        extract_text(parsed)
    }
}

#[derive(Debug, Serialize)]
struct CreateMessageRequest {
    model: String,
    system: String,
    messages: Vec<RequestMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct RequestMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct CreateMessageResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

fn extract_text(response: CreateMessageResponse) -> Result<String, LlmError> {
    let text: String = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect::<Vec<_>>()
        .join("");

    if text.trim().is_empty() {
        return Err(LlmError::InvalidResponse(
            "response contained no text".to_string(),
        ));
    }
    Ok(text)
}

fn map_http_error(status: StatusCode, body: &str) -> LlmError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or_else(|_| body.to_string());
    LlmError::Status {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ChatTurn;
    use somnia_core::types::Role;

    fn context() -> ChatContext {
        ChatContext {
            system: "be helpful".to_string(),
            turns: vec![
                ChatTurn::user("hi"),
                ChatTurn {
                    role: Role::Assistant,
                    content: "hello".to_string(),
                },
                ChatTurn::user("why do I wake at 3am?"),
            ],
        }
    }

    #[test]
    fn test_retryable_classification() {
        assert!(LlmError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(LlmError::Transport("reset".into()).is_retryable());
        assert!(LlmError::Status { status: 503, message: String::new() }.is_retryable());
        assert!(LlmError::Status { status: 429, message: String::new() }.is_retryable());
        assert!(!LlmError::Status { status: 400, message: String::new() }.is_retryable());
        assert!(!LlmError::Status { status: 401, message: String::new() }.is_retryable());
        assert!(!LlmError::InvalidResponse("x".into()).is_retryable());
        assert!(!LlmError::NotConfigured("x".into()).is_retryable());
    }

    #[test]
    fn test_build_request_shape() {
        let client = HttpLlmClient::new(&LlmConfig::default()).unwrap();
        let body = serde_json::to_value(client.build_request(&context())).unwrap();

        assert_eq!(body["system"], "be helpful");
        assert_eq!(body["max_tokens"], 1024);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[2]["content"], "why do I wake at 3am?");
    }

    #[test]
    fn test_extract_text_joins_text_blocks() {
        let parsed: CreateMessageResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"Hello, "},{"type":"tool_use","id":"x"},{"type":"text","text":"world"}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(parsed).unwrap(), "Hello, world");
    }

    #[test]
    fn test_extract_text_rejects_empty() {
        let parsed: CreateMessageResponse =
            serde_json::from_str(r#"{"content":[]}"#).unwrap();
        assert!(matches!(
            extract_text(parsed),
            Err(LlmError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_map_http_error_uses_error_message() {
        let err = map_http_error(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"type":"error","error":{"type":"rate_limit_error","message":"slow down"}}"#,
        );
        assert_eq!(
            err,
            LlmError::Status {
                status: 429,
                message: "slow down".to_string()
            }
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn test_map_http_error_raw_body() {
        let err = map_http_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(err.to_string(), "upstream returned status 502: upstream down");
    }

    #[tokio::test]
    async fn test_generate_without_key_is_not_configured() {
        let client = HttpLlmClient::new(&LlmConfig::default()).unwrap();
        let err = client.generate(&context()).await.unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured(_)));
        assert!(!err.is_retryable());
    }
}
