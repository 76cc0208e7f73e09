use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SomniaError;

// =============================================================================
// Enums
// =============================================================================

/// Author of a message within a conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Text typed by the end user.
    User,
    /// Reply produced by the LLM, or the fallback text on degraded turns.
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = SomniaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(SomniaError::InvalidInput(format!("unknown role: {}", other))),
        }
    }
}

/// Sleep-science topic taxonomy.
///
/// Variant order is the classifier's priority order; `General` is the
/// fallback and always sorts last.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicLabel {
    SleepApnea,
    Insomnia,
    CircadianRhythms,
    SleepDisorders,
    SleepMedicine,
    SleepCycles,
    SleepDuration,
    SleepEnvironment,
    SleepHygiene,
    SleepResearch,
    SleepQuality,
    SleepAndHealth,
    General,
}

impl TopicLabel {
    /// Every label, in priority order.
    pub const ALL: [TopicLabel; 13] = [
        TopicLabel::SleepApnea,
        TopicLabel::Insomnia,
        TopicLabel::CircadianRhythms,
        TopicLabel::SleepDisorders,
        TopicLabel::SleepMedicine,
        TopicLabel::SleepCycles,
        TopicLabel::SleepDuration,
        TopicLabel::SleepEnvironment,
        TopicLabel::SleepHygiene,
        TopicLabel::SleepResearch,
        TopicLabel::SleepQuality,
        TopicLabel::SleepAndHealth,
        TopicLabel::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TopicLabel::SleepApnea => "sleep_apnea",
            TopicLabel::Insomnia => "insomnia",
            TopicLabel::CircadianRhythms => "circadian_rhythms",
            TopicLabel::SleepDisorders => "sleep_disorders",
            TopicLabel::SleepMedicine => "sleep_medicine",
            TopicLabel::SleepCycles => "sleep_cycles",
            TopicLabel::SleepDuration => "sleep_duration",
            TopicLabel::SleepEnvironment => "sleep_environment",
            TopicLabel::SleepHygiene => "sleep_hygiene",
            TopicLabel::SleepResearch => "sleep_research",
            TopicLabel::SleepQuality => "sleep_quality",
            TopicLabel::SleepAndHealth => "sleep_and_health",
            TopicLabel::General => "general",
        }
    }
}

impl fmt::Display for TopicLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TopicLabel {
    type Err = SomniaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TopicLabel::ALL
            .iter()
            .copied()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| SomniaError::InvalidInput(format!("unknown topic: {}", s)))
    }
}

// =============================================================================
// Records
// =============================================================================

/// A conversation thread owned by a single user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub owner_user_id: String,
    pub created_at: DateTime<Utc>,
    /// Updated on every appended message.
    pub last_active_at: DateTime<Utc>,
}

/// An immutable message within a conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    /// Position within the conversation, assigned by the store. Starts at 1.
    pub seq: u64,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Topic assigned at write time. Only user messages carry one.
    pub topic: Option<TopicLabel>,
    /// True when the content is the degraded fallback rather than an LLM reply.
    pub is_error: bool,
}

impl Message {
    /// Length of the content in Unicode scalar values.
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// A message that has not been persisted yet. The store assigns `id`, `seq`
/// and, unless pinned with [`NewMessage::at`], `created_at`.
#[derive(Clone, Debug, PartialEq)]
pub struct NewMessage {
    pub conversation_id: Uuid,
    pub role: Role,
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
    pub topic: Option<TopicLabel>,
    pub is_error: bool,
}

impl NewMessage {
    pub fn user(conversation_id: Uuid, content: impl Into<String>, topic: TopicLabel) -> Self {
        Self {
            conversation_id,
            role: Role::User,
            content: content.into(),
            created_at: None,
            topic: Some(topic),
            is_error: false,
        }
    }

    pub fn assistant(conversation_id: Uuid, content: impl Into<String>, is_error: bool) -> Self {
        Self {
            conversation_id,
            role: Role::Assistant,
            content: content.into(),
            created_at: None,
            topic: None,
            is_error,
        }
    }

    /// Pin the timestamp instead of letting the store stamp it. The store
    /// still raises it to the conversation's latest message time.
    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// A message joined with the owner of its conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub owner_user_id: String,
    #[serde(flatten)]
    pub message: Message,
}

// =============================================================================
// Filters
// =============================================================================

/// Filter for scanning the message log. All fields are conjunctive.
#[derive(Clone, Debug, Default)]
pub struct MessageFilter {
    /// Inclusive lower bound on `created_at`.
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`.
    pub until: Option<DateTime<Utc>>,
    pub user_id: Option<String>,
    pub conversation_id: Option<Uuid>,
    pub role: Option<Role>,
}

impl MessageFilter {
    pub fn window(since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self {
            since: Some(since),
            until: Some(until),
            ..Default::default()
        }
    }
}

/// Filter for listing conversations.
#[derive(Clone, Debug, Default)]
pub struct ConversationFilter {
    pub owner_user_id: Option<String>,
    /// Only conversations with `last_active_at >= active_since`.
    pub active_since: Option<DateTime<Utc>>,
    pub limit: Option<u64>,
}
