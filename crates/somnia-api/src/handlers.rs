//! Route handler functions for all API endpoints.
//!
//! Each handler extracts query/path parameters via axum extractors, calls
//! the orchestrator or the analytics aggregator, and returns JSON.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use somnia_core::types::{Message, Role, TopicLabel};
use somnia_insight::{
    ConversationSummary, ExportFormat, Overview, TopicBreakdown, TrendInterval, UsageTrends,
    UserSummary,
};

use crate::error::ApiError;
use crate::state::AppState;

/// Owner recorded for turns that arrive without a user id.
pub const ANONYMOUS_USER: &str = "anonymous";

const DEFAULT_TOPIC_LIMIT: usize = 10;

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Omitted or unknown ids start a new conversation.
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WindowParams {
    pub days: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct TopicParams {
    pub days: Option<u32>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct TrendParams {
    pub days: Option<u32>,
    pub interval: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExportParams {
    pub days: Option<u32>,
    pub format: Option<String>,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub conversation_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub topic: TopicLabel,
    /// True when the reply is the fallback text.
    pub degraded: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub seq: u64,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub topic: Option<TopicLabel>,
    pub is_error: bool,
}

impl From<Message> for MessageResponse {
    fn from(m: Message) -> Self {
        Self {
            id: m.id,
            seq: m.seq,
            role: m.role,
            content: m.content,
            timestamp: m.created_at,
            topic: m.topic,
            is_error: m.is_error,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationHistoryResponse {
    pub conversation_id: Uuid,
    pub user_id: String,
    pub messages: Vec<MessageResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TopicsResponse {
    pub topics: Vec<TopicLabel>,
}

fn parse_uuid(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid {}: '{}'", what, raw)))
}

// =============================================================================
// Chat
// =============================================================================

/// POST /api/v1/chat - run one conversational turn.
///
/// The turn runs on its own task, so a client that disconnects mid-turn does
/// not leave a user message without its reply.
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let conversation_id = req
        .conversation_id
        .as_deref()
        .map(|raw| parse_uuid(raw, "conversation id"))
        .transpose()?;
    let user_id = req.user_id.unwrap_or_else(|| ANONYMOUS_USER.to_string());

    info!(
        conversation_id = ?conversation_id,
        user_id = %user_id,
        message_length = req.message.chars().count(),
        "Chat request received"
    );

    let orchestrator = Arc::clone(&state.orchestrator);
    let message = req.message;
    let outcome = tokio::spawn(async move {
        orchestrator
            .handle_turn(conversation_id, &user_id, &message)
            .await
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Chat task failed: {}", e)))??;

    Ok(Json(ChatResponse {
        degraded: outcome.is_degraded(),
        response: outcome.assistant_text,
        conversation_id: outcome.conversation_id,
        timestamp: outcome.timestamp,
        topic: outcome.topic,
    }))
}

/// GET /api/v1/chat/conversation/{id} - messages of one conversation.
pub async fn conversation_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> Result<Json<ConversationHistoryResponse>, ApiError> {
    let Query(params) = params?;
    let conversation_id = parse_uuid(&id, "conversation id")?;
    let history = state
        .orchestrator
        .conversation_history(conversation_id, params.user_id.as_deref())?;

    Ok(Json(ConversationHistoryResponse {
        conversation_id: history.conversation.id,
        user_id: history.conversation.owner_user_id,
        messages: history.messages.into_iter().map(MessageResponse::from).collect(),
        created_at: history.conversation.created_at,
        updated_at: history.conversation.last_active_at,
    }))
}

/// GET /api/v1/chat/topics - topics the bot can discuss.
pub async fn topics(State(state): State<AppState>) -> Json<TopicsResponse> {
    Json(TopicsResponse {
        topics: state.orchestrator.available_topics(),
    })
}

// =============================================================================
// Analytics
// =============================================================================

/// GET /api/v1/analytics/overview
pub async fn analytics_overview(
    State(state): State<AppState>,
    params: Result<Query<WindowParams>, QueryRejection>,
) -> Result<Json<Overview>, ApiError> {
    let Query(params) = params?;
    let days = params.days.unwrap_or_else(|| state.analytics.default_days());
    Ok(Json(state.analytics.overview(days)?))
}

/// GET /api/v1/analytics/topics
pub async fn analytics_topics(
    State(state): State<AppState>,
    params: Result<Query<TopicParams>, QueryRejection>,
) -> Result<Json<TopicBreakdown>, ApiError> {
    let Query(params) = params?;
    let days = params.days.unwrap_or_else(|| state.analytics.default_days());
    let limit = params.limit.unwrap_or(DEFAULT_TOPIC_LIMIT);
    Ok(Json(state.analytics.topic_breakdown(days, limit)?))
}

/// GET /api/v1/analytics/users/{user_id} - all-time unless `days` is given.
pub async fn analytics_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    params: Result<Query<WindowParams>, QueryRejection>,
) -> Result<Json<UserSummary>, ApiError> {
    let Query(params) = params?;
    Ok(Json(state.analytics.user_summary(&user_id, params.days)?))
}

/// GET /api/v1/analytics/conversations/{id}
pub async fn analytics_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationSummary>, ApiError> {
    let conversation_id = parse_uuid(&id, "conversation id")?;
    Ok(Json(state.analytics.conversation_summary(conversation_id)?))
}

/// GET /api/v1/analytics/trends
pub async fn analytics_trends(
    State(state): State<AppState>,
    params: Result<Query<TrendParams>, QueryRejection>,
) -> Result<Json<UsageTrends>, ApiError> {
    let Query(params) = params?;
    let days = params.days.unwrap_or_else(|| state.analytics.default_days());
    let interval = match params.interval.as_deref() {
        Some(raw) => raw.parse::<TrendInterval>()?,
        None => TrendInterval::Daily,
    };
    Ok(Json(state.analytics.usage_trends(days, interval)?))
}

/// GET /api/v1/analytics/export - JSON or CSV download of the message log.
pub async fn analytics_export(
    State(state): State<AppState>,
    params: Result<Query<ExportParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params?;
    let days = params.days.unwrap_or_else(|| state.analytics.default_days());
    let format = match params.format.as_deref() {
        Some(raw) => raw.parse::<ExportFormat>()?,
        None => ExportFormat::Json,
    };

    let bytes = state.analytics.export(days, format)?;
    let disposition = format!(
        "attachment; filename=\"somnia-export-{}d.{}\"",
        days,
        format.extension()
    );

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
