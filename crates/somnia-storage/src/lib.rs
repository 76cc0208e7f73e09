//! Somnia Storage crate - SQLite persistence for the conversation log.
//!
//! Provides a WAL-mode SQLite database with migrations and the
//! append-only `ConversationStore` used by chat and analytics.

pub mod db;
pub mod migrations;
pub mod store;

pub use db::Database;
pub use store::{ConversationStore, SqliteConversationStore};
