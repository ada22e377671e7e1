use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (relationships + messages)");
        conn.execute_batch(
            "
            CREATE TABLE relationships (
                id              TEXT PRIMARY KEY,
                user1           TEXT NOT NULL,
                user2           TEXT NOT NULL,
                -- unordered pair, smaller id first
                user_lo         TEXT NOT NULL,
                user_hi         TEXT NOT NULL,
                state           TEXT NOT NULL,
                initiator       TEXT NOT NULL,
                meeting_place   TEXT,
                place_chosen_by TEXT,
                version         INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL,
                UNIQUE(user_lo, user_hi)
            );

            CREATE INDEX idx_relationships_user1 ON relationships(user1, state);
            CREATE INDEX idx_relationships_user2 ON relationships(user2, state);

            CREATE TABLE messages (
                global_id       INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id TEXT NOT NULL REFERENCES relationships(id),
                sender_id       TEXT NOT NULL,
                receiver_id     TEXT NOT NULL,
                sequence_id     INTEGER NOT NULL,
                message_type    TEXT NOT NULL,
                body            TEXT NOT NULL,
                delivered       INTEGER NOT NULL DEFAULT 0,
                delivered_at    TEXT,
                read_at         TEXT,
                sent_at         TEXT NOT NULL,
                UNIQUE(conversation_id, sequence_id)
            );

            CREATE INDEX idx_messages_receiver ON messages(receiver_id, delivered);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
