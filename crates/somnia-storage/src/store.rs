//! Append-only conversation log.
//!
//! `ConversationStore` is the seam shared by the chat orchestrator (writes)
//! and the analytics aggregator (reads). Messages are never updated or
//! deleted; sequence positions are assigned inside the store under the
//! database lock so concurrent appends to one conversation cannot collide.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::OptionalExtension;
use tracing::debug;
use uuid::Uuid;

use somnia_core::error::SomniaError;
use somnia_core::types::{
    Conversation, ConversationFilter, Message, MessageFilter, MessageRecord, NewMessage, Role,
    TopicLabel,
};

use crate::db::Database;

/// Durable storage for conversations and their messages.
pub trait ConversationStore: Send + Sync {
    /// Create a new, empty conversation owned by `owner_user_id`.
    fn create_conversation(&self, owner_user_id: &str) -> Result<Conversation, SomniaError>;

    fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>, SomniaError>;

    /// Conversations matching the filter, most recently active first.
    fn list_conversations(
        &self,
        filter: &ConversationFilter,
    ) -> Result<Vec<Conversation>, SomniaError>;

    /// Append a message, assigning the next sequence position atomically and
    /// bumping the conversation's `last_active_at`.
    fn append_message(&self, message: NewMessage) -> Result<Message, SomniaError>;

    /// All messages of a conversation in sequence order.
    fn get_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, SomniaError>;

    /// Point-in-time scan of the message log, ordered by
    /// (created_at, conversation_id, seq).
    fn scan_messages(&self, filter: &MessageFilter) -> Result<Vec<MessageRecord>, SomniaError>;
}

/// SQLite-backed conversation store.
pub struct SqliteConversationStore {
    db: Arc<Database>,
}

impl SqliteConversationStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

const MESSAGE_COLUMNS: &str =
    "m.id, m.conversation_id, m.seq, m.role, m.content, m.created_at, m.topic, m.is_error";

impl ConversationStore for SqliteConversationStore {
    fn create_conversation(&self, owner_user_id: &str) -> Result<Conversation, SomniaError> {
        let now = from_millis(Utc::now().timestamp_millis());
        let conversation = Conversation {
            id: Uuid::new_v4(),
            owner_user_id: owner_user_id.to_string(),
            created_at: now,
            last_active_at: now,
        };

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conversations (id, owner_user_id, created_at, last_active_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    conversation.id.to_string(),
                    conversation.owner_user_id,
                    to_millis(&conversation.created_at),
                    to_millis(&conversation.last_active_at),
                ],
            )
            .map_err(|e| SomniaError::Storage(format!("Failed to create conversation: {}", e)))?;
            Ok(())
        })?;

        debug!(conversation_id = %conversation.id, "Conversation created");
        Ok(conversation)
    }

    fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>, SomniaError> {
        self.db.with_conn(|conn| {
            let result = conn
                .query_row(
                    "SELECT id, owner_user_id, created_at, last_active_at
                     FROM conversations WHERE id = ?1",
                    rusqlite::params![id.to_string()],
                    |row| Ok(row_to_conversation(row)),
                )
                .optional()
                .map_err(|e| SomniaError::Storage(e.to_string()))?;

            result.transpose()
        })
    }

    fn list_conversations(
        &self,
        filter: &ConversationFilter,
    ) -> Result<Vec<Conversation>, SomniaError> {
        self.db.with_conn(|conn| {
            let mut sql = String::from(
                "SELECT id, owner_user_id, created_at, last_active_at
                 FROM conversations WHERE 1 = 1",
            );
            let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

            if let Some(ref owner) = filter.owner_user_id {
                params_vec.push(Box::new(owner.clone()));
                sql.push_str(&format!(" AND owner_user_id = ?{}", params_vec.len()));
            }
            if let Some(ref since) = filter.active_since {
                params_vec.push(Box::new(to_millis(since)));
                sql.push_str(&format!(" AND last_active_at >= ?{}", params_vec.len()));
            }
            sql.push_str(" ORDER BY last_active_at DESC, id ASC");
            if let Some(limit) = filter.limit {
                params_vec.push(Box::new(limit as i64));
                sql.push_str(&format!(" LIMIT ?{}", params_vec.len()));
            }

            let params_refs: Vec<&dyn rusqlite::types::ToSql> =
                params_vec.iter().map(|p| p.as_ref()).collect();

            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| SomniaError::Storage(format!("Conversation list prepare: {}", e)))?;
            let rows = stmt
                .query_map(params_refs.as_slice(), |row| Ok(row_to_conversation(row)))
                .map_err(|e| SomniaError::Storage(format!("Conversation list: {}", e)))?;

            let mut conversations = Vec::new();
            for row in rows {
                conversations.push(row.map_err(|e| SomniaError::Storage(e.to_string()))??);
            }
            Ok(conversations)
        })
    }

    fn append_message(&self, message: NewMessage) -> Result<Message, SomniaError> {
        let id = Uuid::new_v4();
        let conversation_key = message.conversation_id.to_string();

        let (seq, created_at) = self.db.with_conn(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| SomniaError::Storage(format!("Failed to begin append: {}", e)))?;

            let exists: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM conversations WHERE id = ?1",
                    rusqlite::params![conversation_key],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| SomniaError::Storage(e.to_string()))?;
            if exists.is_none() {
                return Err(SomniaError::InvalidInput(format!(
                    "conversation {} does not exist",
                    message.conversation_id
                )));
            }

            let (seq, latest): (i64, Option<i64>) = tx
                .query_row(
                    "SELECT COALESCE(MAX(seq), 0) + 1, MAX(created_at)
                     FROM messages WHERE conversation_id = ?1",
                    rusqlite::params![conversation_key],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .map_err(|e| SomniaError::Storage(format!("Failed to allocate seq: {}", e)))?;

            // created_at never decreases along seq within a conversation.
            let stamped = message
                .created_at
                .map(|at| to_millis(&at))
                .unwrap_or_else(|| Utc::now().timestamp_millis());
            let created_at = latest.map_or(stamped, |latest| stamped.max(latest));

            tx.execute(
                "INSERT INTO messages (id, conversation_id, seq, role, content, created_at, topic, is_error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    id.to_string(),
                    conversation_key,
                    seq,
                    message.role.as_str(),
                    message.content,
                    created_at,
                    message.topic.map(|t| t.as_str()),
                    message.is_error as i32,
                ],
            )
            .map_err(|e| SomniaError::Storage(format!("Failed to append message: {}", e)))?;

            tx.execute(
                "UPDATE conversations SET last_active_at = MAX(last_active_at, ?2) WHERE id = ?1",
                rusqlite::params![conversation_key, created_at],
            )
            .map_err(|e| SomniaError::Storage(format!("Failed to touch conversation: {}", e)))?;

            tx.commit()
                .map_err(|e| SomniaError::Storage(format!("Failed to commit append: {}", e)))?;
            Ok((seq, created_at))
        })?;

        debug!(
            conversation_id = %message.conversation_id,
            seq,
            role = %message.role,
            "Message appended"
        );

        Ok(Message {
            id,
            conversation_id: message.conversation_id,
            seq: seq as u64,
            role: message.role,
            content: message.content,
            created_at: from_millis(created_at),
            topic: message.topic,
            is_error: message.is_error,
        })
    }

    fn get_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, SomniaError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM messages m WHERE m.conversation_id = ?1 ORDER BY m.seq ASC",
                    MESSAGE_COLUMNS
                ))
                .map_err(|e| SomniaError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![conversation_id.to_string()], |row| {
                    Ok(row_to_message(row))
                })
                .map_err(|e| SomniaError::Storage(e.to_string()))?;

            let mut messages = Vec::new();
            for row in rows {
                messages.push(row.map_err(|e| SomniaError::Storage(e.to_string()))??);
            }
            Ok(messages)
        })
    }

    fn scan_messages(&self, filter: &MessageFilter) -> Result<Vec<MessageRecord>, SomniaError> {
        self.db.with_conn(|conn| {
            let mut sql = format!(
                "SELECT {}, c.owner_user_id
                 FROM messages m
                 JOIN conversations c ON c.id = m.conversation_id
                 WHERE 1 = 1",
                MESSAGE_COLUMNS
            );
            let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

            if let Some(ref since) = filter.since {
                params_vec.push(Box::new(to_millis(since)));
                sql.push_str(&format!(" AND m.created_at >= ?{}", params_vec.len()));
            }
            if let Some(ref until) = filter.until {
                params_vec.push(Box::new(to_millis(until)));
                sql.push_str(&format!(" AND m.created_at <= ?{}", params_vec.len()));
            }
            if let Some(ref user_id) = filter.user_id {
                params_vec.push(Box::new(user_id.clone()));
                sql.push_str(&format!(" AND c.owner_user_id = ?{}", params_vec.len()));
            }
            if let Some(conversation_id) = filter.conversation_id {
                params_vec.push(Box::new(conversation_id.to_string()));
                sql.push_str(&format!(" AND m.conversation_id = ?{}", params_vec.len()));
            }
            if let Some(role) = filter.role {
                params_vec.push(Box::new(role.as_str()));
                sql.push_str(&format!(" AND m.role = ?{}", params_vec.len()));
            }
            sql.push_str(" ORDER BY m.created_at ASC, m.conversation_id ASC, m.seq ASC");

            let params_refs: Vec<&dyn rusqlite::types::ToSql> =
                params_vec.iter().map(|p| p.as_ref()).collect();

            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| SomniaError::Storage(format!("Message scan prepare: {}", e)))?;
            let rows = stmt
                .query_map(params_refs.as_slice(), |row| {
                    let owner_user_id: String = row.get(8)?;
                    Ok(row_to_message(row).map(|message| MessageRecord {
                        owner_user_id,
                        message,
                    }))
                })
                .map_err(|e| SomniaError::Storage(format!("Message scan: {}", e)))?;

            let mut records = Vec::new();
            for row in rows {
                records.push(row.map_err(|e| SomniaError::Storage(e.to_string()))??);
            }
            Ok(records)
        })
    }
}

// =============================================================================
// Row mapping
// =============================================================================

fn to_millis(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

fn parse_uuid(value: &str) -> Result<Uuid, SomniaError> {
    Uuid::parse_str(value).map_err(|e| SomniaError::Storage(format!("Invalid UUID: {}", e)))
}

fn row_to_conversation(row: &rusqlite::Row<'_>) -> Result<Conversation, SomniaError> {
    let id: String = row.get(0).map_err(|e| SomniaError::Storage(e.to_string()))?;
    let owner_user_id: String = row.get(1).map_err(|e| SomniaError::Storage(e.to_string()))?;
    let created_at: i64 = row.get(2).map_err(|e| SomniaError::Storage(e.to_string()))?;
    let last_active_at: i64 = row.get(3).map_err(|e| SomniaError::Storage(e.to_string()))?;

    Ok(Conversation {
        id: parse_uuid(&id)?,
        owner_user_id,
        created_at: from_millis(created_at),
        last_active_at: from_millis(last_active_at),
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> Result<Message, SomniaError> {
    let id: String = row.get(0).map_err(|e| SomniaError::Storage(e.to_string()))?;
    let conversation_id: String = row.get(1).map_err(|e| SomniaError::Storage(e.to_string()))?;
    let seq: i64 = row.get(2).map_err(|e| SomniaError::Storage(e.to_string()))?;
    let role: String = row.get(3).map_err(|e| SomniaError::Storage(e.to_string()))?;
    let content: String = row.get(4).map_err(|e| SomniaError::Storage(e.to_string()))?;
    let created_at: i64 = row.get(5).map_err(|e| SomniaError::Storage(e.to_string()))?;
    let topic: Option<String> = row.get(6).map_err(|e| SomniaError::Storage(e.to_string()))?;
    let is_error: i32 = row.get(7).map_err(|e| SomniaError::Storage(e.to_string()))?;

    let role: Role = role
        .parse()
        .map_err(|e: SomniaError| SomniaError::Storage(e.to_string()))?;
    let topic = topic
        .map(|t| t.parse::<TopicLabel>())
        .transpose()
        .map_err(|e| SomniaError::Storage(e.to_string()))?;

    Ok(Message {
        id: parse_uuid(&id)?,
        conversation_id: parse_uuid(&conversation_id)?,
        seq: seq as u64,
        role,
        content,
        created_at: from_millis(created_at),
        topic,
        is_error: is_error != 0,
    })
}
