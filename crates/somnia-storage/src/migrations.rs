//! Database schema migrations.
//!
//! Applies the conversation log schema and records each applied version in
//! the schema_migrations table.

use rusqlite::Connection;
use tracing::info;

use somnia_core::error::SomniaError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), SomniaError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| SomniaError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| SomniaError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: conversation_log");
    }

    Ok(())
}

/// Version 1: conversations and their append-only message log.
///
/// Timestamps are stored as Unix milliseconds.
fn apply_v1(conn: &Connection) -> Result<(), SomniaError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS conversations (
            id              TEXT PRIMARY KEY NOT NULL,
            owner_user_id   TEXT NOT NULL,
            created_at      INTEGER NOT NULL,
            last_active_at  INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_owner
            ON conversations (owner_user_id, last_active_at DESC);

        CREATE TABLE IF NOT EXISTS messages (
            id              TEXT PRIMARY KEY NOT NULL,
            conversation_id TEXT NOT NULL,
            seq             INTEGER NOT NULL,
            role            TEXT NOT NULL
                            CHECK (role IN ('user', 'assistant')),
            content         TEXT NOT NULL,
            created_at      INTEGER NOT NULL,
            topic           TEXT,
            is_error        INTEGER NOT NULL DEFAULT 0,
            UNIQUE (conversation_id, seq),
            FOREIGN KEY (conversation_id) REFERENCES conversations(id)
        );

        CREATE INDEX IF NOT EXISTS idx_messages_created_at
            ON messages (created_at ASC);

        CREATE INDEX IF NOT EXISTS idx_messages_role_created_at
            ON messages (role, created_at ASC);

        INSERT INTO schema_migrations (version, name) VALUES (1, 'conversation_log');
        ",
    )
    .map_err(|e| SomniaError::Storage(format!("Migration v1 failed: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_duplicate_seq_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO conversations (id, owner_user_id, created_at, last_active_at)
             VALUES ('c1', 'u1', 0, 0)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO messages (id, conversation_id, seq, role, content, created_at)
             VALUES ('m1', 'c1', 1, 'user', 'hi', 0)",
            [],
        )
        .unwrap();

        let dup = conn.execute(
            "INSERT INTO messages (id, conversation_id, seq, role, content, created_at)
             VALUES ('m2', 'c1', 1, 'assistant', 'hello', 0)",
            [],
        );
        assert!(dup.is_err());
    }

    #[test]
    fn test_role_check_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn.execute(
            "INSERT INTO conversations (id, owner_user_id, created_at, last_active_at)
             VALUES ('c1', 'u1', 0, 0)",
            [],
        )
        .unwrap();

        let bad = conn.execute(
            "INSERT INTO messages (id, conversation_id, seq, role, content, created_at)
             VALUES ('m1', 'c1', 1, 'system', 'x', 0)",
            [],
        );
        assert!(bad.is_err());
    }
}
