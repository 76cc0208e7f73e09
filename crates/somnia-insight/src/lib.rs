//! Somnia Insight crate - read-only analytics over the conversation log.
//!
//! Every query recomputes its result from a fresh scan of the store:
//! - Windowed overview (interactions, unique users, message length, top topics)
//! - Per-user and per-conversation rollups
//! - Topic breakdown and usage trends
//! - Deterministic JSON and CSV export

pub mod analytics;
pub mod error;
pub mod export;
pub mod types;

pub use analytics::AnalyticsAggregator;
pub use error::InsightError;
pub use export::{ExportFormat, ExportRow};
pub use types::{
    ConversationSummary, Overview, TopicBreakdown, TopicCount, TopicStat, TrendBucket,
    TrendInterval, UsageTrends, UserSummary,
};
