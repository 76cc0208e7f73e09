//! Read-only analytics over the conversation log.
//!
//! The aggregator keeps no counters of its own. Every call scans the store
//! for its window and derives the result from those rows, so repeated calls
//! against unchanged data return identical results.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use tracing::debug;
use uuid::Uuid;

use somnia_core::config::AnalyticsConfig;
use somnia_core::types::{Message, MessageFilter, MessageRecord, Role, TopicLabel};
use somnia_storage::ConversationStore;

use crate::error::InsightError;
use crate::export::{self, ExportFormat, ExportRow};
use crate::types::{
    ConversationSummary, Overview, TopicBreakdown, TopicCount, TopicStat, TrendBucket,
    TrendInterval, UsageTrends, UserSummary,
};

/// Largest accepted `limit` for the topic breakdown.
pub const MAX_TOPIC_LIMIT: usize = 50;

/// Computes windowed summaries from the message log.
pub struct AnalyticsAggregator {
    store: Arc<dyn ConversationStore>,
    config: AnalyticsConfig,
}

impl AnalyticsAggregator {
    pub fn new(store: Arc<dyn ConversationStore>, config: AnalyticsConfig) -> Self {
        Self { store, config }
    }

    /// Window used when a caller does not specify one.
    pub fn default_days(&self) -> u32 {
        self.config.default_days
    }

    // ========================================================================
    // Overview
    // ========================================================================

    pub fn overview(&self, days: u32) -> Result<Overview, InsightError> {
        self.overview_at(days, Utc::now())
    }

    pub fn overview_at(&self, days: u32, now: DateTime<Utc>) -> Result<Overview, InsightError> {
        let (period_start, period_end) = self.window(days, now)?;
        let records = self.scan(MessageFilter::window(period_start, period_end))?;

        let user_messages: Vec<&Message> = user_messages(&records).collect();
        let unique_users: BTreeSet<&str> =
            records.iter().map(|r| r.owner_user_id.as_str()).collect();

        let mut top_topics = topic_counts(user_messages.iter().copied());
        top_topics.truncate(self.config.top_topics);

        let overview = Overview {
            period_start,
            period_end,
            total_interactions: user_messages.len() as u64,
            unique_users: unique_users.len() as u64,
            avg_message_length: mean_length(user_messages.iter().copied()),
            top_topics,
            degraded_responses: degraded_count(records.iter().map(|r| &r.message)),
        };

        debug!(
            days,
            total_interactions = overview.total_interactions,
            unique_users = overview.unique_users,
            "Overview computed"
        );
        Ok(overview)
    }

    // ========================================================================
    // Per-user rollup
    // ========================================================================

    /// Summary of one user's activity, over all time when `days` is `None`.
    pub fn user_summary(
        &self,
        user_id: &str,
        days: Option<u32>,
    ) -> Result<UserSummary, InsightError> {
        self.user_summary_at(user_id, days, Utc::now())
    }

    pub fn user_summary_at(
        &self,
        user_id: &str,
        days: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<UserSummary, InsightError> {
        let mut filter = MessageFilter {
            user_id: Some(user_id.to_string()),
            ..Default::default()
        };
        if let Some(days) = days {
            let (since, until) = self.window(days, now)?;
            filter.since = Some(since);
            filter.until = Some(until);
        }

        let records = self.scan(filter)?;
        let (first, last) = match (records.first(), records.last()) {
            (Some(first), Some(last)) => (first.message.created_at, last.message.created_at),
            _ => return Err(InsightError::UserNotFound(user_id.to_string())),
        };

        let user_messages: Vec<&Message> = user_messages(&records).collect();
        let mut favorite_topics = topic_counts(user_messages.iter().copied());
        favorite_topics.truncate(self.config.favorite_topics);

        let mut spans: BTreeMap<Uuid, (DateTime<Utc>, DateTime<Utc>)> = BTreeMap::new();
        for record in &records {
            let at = record.message.created_at;
            spans
                .entry(record.message.conversation_id)
                .and_modify(|(start, end)| {
                    *start = (*start).min(at);
                    *end = (*end).max(at);
                })
                .or_insert((at, at));
        }
        let session_secs: Vec<f64> = spans
            .values()
            .map(|(start, end)| seconds_between(*start, *end))
            .collect();

        let summary = UserSummary {
            user_id: user_id.to_string(),
            total_interactions: user_messages.len() as u64,
            conversation_count: spans.len() as u64,
            favorite_topics,
            avg_message_length: mean_length(user_messages.iter().copied()),
            avg_session_length_secs: mean(&session_secs),
            degraded_responses: degraded_count(records.iter().map(|r| &r.message)),
            first_seen: first,
            last_active: last,
        };

        debug!(user_id, conversations = summary.conversation_count, "User summary computed");
        Ok(summary)
    }

    // ========================================================================
    // Topics
    // ========================================================================

    pub fn topic_breakdown(&self, days: u32, limit: usize) -> Result<TopicBreakdown, InsightError> {
        self.topic_breakdown_at(days, limit, Utc::now())
    }

    pub fn topic_breakdown_at(
        &self,
        days: u32,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<TopicBreakdown, InsightError> {
        if limit == 0 || limit > MAX_TOPIC_LIMIT {
            return Err(InsightError::InvalidLimit {
                limit,
                max: MAX_TOPIC_LIMIT,
            });
        }
        let (period_start, period_end) = self.window(days, now)?;
        let records = self.scan(MessageFilter {
            role: Some(Role::User),
            ..MessageFilter::window(period_start, period_end)
        })?;

        let mut by_topic: BTreeMap<TopicLabel, (u64, usize)> = BTreeMap::new();
        for message in user_messages(&records) {
            if let Some(topic) = message.topic {
                let entry = by_topic.entry(topic).or_insert((0, 0));
                entry.0 += 1;
                entry.1 += message.char_len();
            }
        }

        let total = records.len() as u64;
        let mut topics: Vec<TopicStat> = by_topic
            .into_iter()
            .map(|(topic, (count, chars))| TopicStat {
                topic,
                count,
                percentage: if total == 0 {
                    0.0
                } else {
                    round2(count as f64 * 100.0 / total as f64)
                },
                avg_message_length: round2(chars as f64 / count as f64),
            })
            .collect();
        topics.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.topic.as_str().cmp(b.topic.as_str()))
        });
        topics.truncate(limit);
        debug!(days, limit, total, "Topic breakdown computed");

        Ok(TopicBreakdown {
            period_start,
            period_end,
            total_interactions: total,
            topics,
        })
    }

    // ========================================================================
    // Per-conversation rollup
    // ========================================================================

    pub fn conversation_summary(
        &self,
        conversation_id: Uuid,
    ) -> Result<ConversationSummary, InsightError> {
        let conversation = self
            .store
            .get_conversation(conversation_id)?
            .ok_or(InsightError::ConversationNotFound(conversation_id))?;
        let messages = self.store.get_messages(conversation_id)?;

        let user: Vec<&Message> = messages.iter().filter(|m| m.role == Role::User).collect();
        let assistant: Vec<&Message> = messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .collect();

        let started_at = messages
            .first()
            .map(|m| m.created_at)
            .unwrap_or(conversation.created_at);
        let ended_at = messages.last().map(|m| m.created_at);

        Ok(ConversationSummary {
            conversation_id,
            user_id: conversation.owner_user_id,
            total_messages: messages.len() as u64,
            user_messages: user.len() as u64,
            assistant_messages: assistant.len() as u64,
            degraded_responses: degraded_count(messages.iter()),
            topics: topic_counts(user.iter().copied()),
            avg_message_length: mean_length(user.iter().copied()),
            avg_response_length: mean_length(assistant.iter().copied()),
            started_at,
            ended_at,
            duration_secs: ended_at
                .map(|end| seconds_between(started_at, end))
                .unwrap_or(0.0),
        })
    }

    // ========================================================================
    // Trends
    // ========================================================================

    pub fn usage_trends(
        &self,
        days: u32,
        interval: TrendInterval,
    ) -> Result<UsageTrends, InsightError> {
        self.usage_trends_at(days, interval, Utc::now())
    }

    pub fn usage_trends_at(
        &self,
        days: u32,
        interval: TrendInterval,
        now: DateTime<Utc>,
    ) -> Result<UsageTrends, InsightError> {
        let (period_start, period_end) = self.window(days, now)?;
        let records = self.scan(MessageFilter::window(period_start, period_end))?;

        #[derive(Default)]
        struct Tally<'a> {
            interactions: u64,
            users: BTreeSet<&'a str>,
            degraded: u64,
        }

        let mut tallies: BTreeMap<NaiveDate, Tally<'_>> = BTreeMap::new();
        for record in &records {
            let key = bucket_start(record.message.created_at.date_naive(), interval);
            let tally = tallies.entry(key).or_default();
            tally.users.insert(record.owner_user_id.as_str());
            match record.message.role {
                Role::User => tally.interactions += 1,
                Role::Assistant if record.message.is_error => tally.degraded += 1,
                Role::Assistant => {}
            }
        }

        let mut buckets = Vec::new();
        let last = bucket_start(period_end.date_naive(), interval);
        let mut cursor = Some(bucket_start(period_start.date_naive(), interval));
        while let Some(day) = cursor.filter(|d| *d <= last) {
            let bucket = match tallies.get(&day) {
                Some(t) => TrendBucket {
                    bucket_start: day,
                    interactions: t.interactions,
                    unique_users: t.users.len() as u64,
                    degraded_responses: t.degraded,
                },
                None => TrendBucket {
                    bucket_start: day,
                    interactions: 0,
                    unique_users: 0,
                    degraded_responses: 0,
                },
            };
            buckets.push(bucket);
            cursor = next_bucket(day, interval);
        }

        debug!(days, %interval, buckets = buckets.len(), "Usage trends computed");
        Ok(UsageTrends {
            interval,
            period_start,
            period_end,
            buckets,
        })
    }

    // ========================================================================
    // Export
    // ========================================================================

    /// Every message in the window, one row each, in log order.
    pub fn export_rows(&self, days: u32) -> Result<Vec<ExportRow>, InsightError> {
        self.export_rows_at(days, Utc::now()).map(|(rows, _, _)| rows)
    }

    fn export_rows_at(
        &self,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<(Vec<ExportRow>, DateTime<Utc>, DateTime<Utc>), InsightError> {
        let (period_start, period_end) = self.window(days, now)?;
        let records = self.scan(MessageFilter::window(period_start, period_end))?;
        let rows = records.iter().map(ExportRow::from).collect();
        Ok((rows, period_start, period_end))
    }

    pub fn export(&self, days: u32, format: ExportFormat) -> Result<Vec<u8>, InsightError> {
        self.export_at(days, format, Utc::now())
    }

    pub fn export_at(
        &self,
        days: u32,
        format: ExportFormat,
        now: DateTime<Utc>,
    ) -> Result<Vec<u8>, InsightError> {
        let (rows, period_start, period_end) = self.export_rows_at(days, now)?;
        let bytes = export::encode(&rows, format, &period_start, &period_end)?;
        debug!(days, %format, rows = rows.len(), bytes = bytes.len(), "Export encoded");
        Ok(bytes)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn window(
        &self,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>), InsightError> {
        let max = self.config.max_days;
        if days == 0 || days > max {
            return Err(InsightError::InvalidWindow { days, max });
        }
        Ok((now - Duration::days(i64::from(days)), now))
    }

    fn scan(&self, filter: MessageFilter) -> Result<Vec<MessageRecord>, InsightError> {
        Ok(self.store.scan_messages(&filter)?)
    }
}

fn user_messages(records: &[MessageRecord]) -> impl Iterator<Item = &Message> {
    records
        .iter()
        .map(|r| &r.message)
        .filter(|m| m.role == Role::User)
}

fn degraded_count<'a>(messages: impl Iterator<Item = &'a Message>) -> u64 {
    messages
        .filter(|m| m.role == Role::Assistant && m.is_error)
        .count() as u64
}

/// Topic distribution sorted by count descending, then label ascending.
fn topic_counts<'a>(messages: impl Iterator<Item = &'a Message>) -> Vec<TopicCount> {
    let mut counts: BTreeMap<TopicLabel, u64> = BTreeMap::new();
    for topic in messages.filter_map(|m| m.topic) {
        *counts.entry(topic).or_insert(0) += 1;
    }

    let mut out: Vec<TopicCount> = counts
        .into_iter()
        .map(|(topic, count)| TopicCount { topic, count })
        .collect();
    out.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.topic.as_str().cmp(b.topic.as_str()))
    });
    out
}

/// Mean character length, 0 for an empty set.
fn mean_length<'a>(messages: impl Iterator<Item = &'a Message>) -> f64 {
    let lengths: Vec<f64> = messages.map(|m| m.char_len() as f64).collect();
    mean(&lengths)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    round2(values.iter().sum::<f64>() / values.len() as f64)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 1000.0
}

fn bucket_start(day: NaiveDate, interval: TrendInterval) -> NaiveDate {
    match interval {
        TrendInterval::Daily => day,
        TrendInterval::Weekly => {
            day - Duration::days(i64::from(day.weekday().num_days_from_monday()))
        }
        TrendInterval::Monthly => day.with_day(1).unwrap_or(day),
    }
}

fn next_bucket(start: NaiveDate, interval: TrendInterval) -> Option<NaiveDate> {
    match interval {
        TrendInterval::Daily => start.succ_opt(),
        TrendInterval::Weekly => start.checked_add_signed(Duration::days(7)),
        TrendInterval::Monthly => start.checked_add_months(Months::new(1)),
    }
}
