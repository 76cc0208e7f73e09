use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use somnia_core::types::TopicLabel;

use crate::error::InsightError;

/// A topic with its number of user messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicCount {
    pub topic: TopicLabel,
    pub count: u64,
}

/// Windowed summary of the whole log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    /// User messages in the window.
    pub total_interactions: u64,
    /// Distinct owners of conversations with any message in the window.
    pub unique_users: u64,
    /// Mean character length of user messages, 0 when there are none.
    pub avg_message_length: f64,
    /// Count descending, then label ascending.
    pub top_topics: Vec<TopicCount>,
    /// Fallback replies in the window.
    pub degraded_responses: u64,
}

/// Per-user rollup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub user_id: String,
    pub total_interactions: u64,
    pub conversation_count: u64,
    pub favorite_topics: Vec<TopicCount>,
    pub avg_message_length: f64,
    /// Mean time between the first and last message of each conversation.
    pub avg_session_length_secs: f64,
    pub degraded_responses: u64,
    pub first_seen: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

/// One row of the topic breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicStat {
    pub topic: TopicLabel,
    pub count: u64,
    /// Share of user messages in the window, 0-100.
    pub percentage: f64,
    pub avg_message_length: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicBreakdown {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub total_interactions: u64,
    pub topics: Vec<TopicStat>,
}

/// Rollup of a single conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub conversation_id: Uuid,
    pub user_id: String,
    pub total_messages: u64,
    pub user_messages: u64,
    pub assistant_messages: u64,
    pub degraded_responses: u64,
    pub topics: Vec<TopicCount>,
    pub avg_message_length: f64,
    pub avg_response_length: f64,
    pub started_at: DateTime<Utc>,
    /// Time of the last message, `None` for an empty conversation.
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_secs: f64,
}

/// Bucket width for usage trends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendInterval {
    Daily,
    /// ISO weeks, starting Monday.
    Weekly,
    /// Calendar months.
    Monthly,
}

impl TrendInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendInterval::Daily => "daily",
            TrendInterval::Weekly => "weekly",
            TrendInterval::Monthly => "monthly",
        }
    }
}

impl fmt::Display for TrendInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrendInterval {
    type Err = InsightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daily" => Ok(TrendInterval::Daily),
            "weekly" => Ok(TrendInterval::Weekly),
            "monthly" => Ok(TrendInterval::Monthly),
            _ => Err(InsightError::UnsupportedInterval(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendBucket {
    /// First UTC day covered by the bucket.
    pub bucket_start: NaiveDate,
    pub interactions: u64,
    pub unique_users: u64,
    pub degraded_responses: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageTrends {
    pub interval: TrendInterval,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    /// Contiguous buckets, oldest first, including empty ones.
    pub buckets: Vec<TrendBucket>,
}
