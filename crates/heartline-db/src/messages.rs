use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params, params_from_iter};
use uuid::Uuid;

use heartline_types::models::{Message, MessageType};

use crate::models::{MESSAGE_COLUMNS, MessageRow};
use crate::{Database, Result, StoreError, format_ts};

impl Database {
    /// Append a message to a conversation, assigning its global id and the
    /// next per-conversation sequence id in one IMMEDIATE transaction.
    pub fn append_message(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        receiver_id: Uuid,
        message_type: MessageType,
        body: &str,
    ) -> Result<Message> {
        let cid = conversation_id.to_string();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let parties: Option<(String, String)> = tx
                .query_row(
                    "SELECT user1, user2 FROM relationships WHERE id = ?1",
                    [&cid],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let (user1, user2) = parties.ok_or(StoreError::NotFound("conversation"))?;

            let (sender, receiver) = (sender_id.to_string(), receiver_id.to_string());
            let valid = (sender == user1 && receiver == user2) || (sender == user2 && receiver == user1);
            if !valid {
                return Err(StoreError::InvalidParticipants);
            }

            let sequence_id: i64 = tx.query_row(
                "SELECT COALESCE(MAX(sequence_id), 0) + 1 FROM messages WHERE conversation_id = ?1",
                [&cid],
                |row| row.get(0),
            )?;

            let sent_at = Utc::now();
            tx.execute(
                "INSERT INTO messages
                    (conversation_id, sender_id, receiver_id, sequence_id, message_type, body, sent_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    cid,
                    sender,
                    receiver,
                    sequence_id,
                    message_type.as_str(),
                    body,
                    format_ts(&sent_at),
                ],
            )?;
            let global_id = tx.last_insert_rowid();
            tx.commit()?;

            Ok(Message {
                global_id,
                conversation_id,
                sender_id,
                receiver_id,
                sequence_id,
                message_type,
                body: body.to_string(),
                delivered: false,
                delivered_at: None,
                read_at: None,
                // Round-trip through storage precision so callers see what history returns.
                sent_at: crate::parse_ts(&format_ts(&sent_at))?,
            })
        })
    }

    /// Up to `limit` messages with `sequence_id < before` (or the newest
    /// `limit` overall), in ascending sequence order.
    pub fn message_history(
        &self,
        conversation_id: Uuid,
        limit: u32,
        before_sequence_id: Option<i64>,
    ) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE conversation_id = ?1 AND (?2 IS NULL OR sequence_id < ?2)
                 ORDER BY sequence_id DESC
                 LIMIT ?3"
            ))?;
            let rows = stmt
                .query_map(
                    params![conversation_id.to_string(), before_sequence_id, i64::from(limit)],
                    MessageRow::from_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut messages = rows
                .into_iter()
                .map(Message::try_from)
                .collect::<Result<Vec<_>>>()?;
            messages.reverse();
            Ok(messages)
        })
    }

    /// Mark messages addressed to `receiver_id` as delivered. Returns only
    /// the messages that transitioned; already-delivered ones are untouched.
    pub fn mark_delivered(&self, message_ids: &[i64], receiver_id: Uuid) -> Result<Vec<Message>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }
        self.with_conn_mut(|conn| {
            update_returning(
                conn,
                "UPDATE messages SET delivered = 1, delivered_at = ?1
                 WHERE receiver_id = ?2 AND delivered = 0",
                receiver_id,
                message_ids,
            )
        })
    }

    /// Mark messages addressed to `receiver_id` as read. Reading implies
    /// delivery, so undelivered rows also get a delivery timestamp.
    pub fn mark_read(&self, message_ids: &[i64], receiver_id: Uuid) -> Result<Vec<Message>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }
        self.with_conn_mut(|conn| {
            update_returning(
                conn,
                "UPDATE messages SET read_at = ?1, delivered = 1, delivered_at = COALESCE(delivered_at, ?1)
                 WHERE receiver_id = ?2 AND read_at IS NULL",
                receiver_id,
                message_ids,
            )
        })
    }
}

/// Ids bound per UPDATE. SQLite caps host parameters per statement, so
/// longer lists are split and applied in one transaction.
const IDS_PER_STATEMENT: usize = 500;

/// Runs `update` (which binds ?1 = now, ?2 = receiver) restricted to
/// `message_ids` and returns the updated rows ordered by global id.
fn update_returning(
    conn: &mut Connection,
    update: &str,
    receiver_id: Uuid,
    message_ids: &[i64],
) -> Result<Vec<Message>> {
    let now = Value::Text(format_ts(&Utc::now()));
    let receiver = Value::Text(receiver_id.to_string());

    let tx = conn.transaction()?;
    let mut rows = Vec::new();
    for chunk in message_ids.chunks(IDS_PER_STATEMENT) {
        let placeholders: Vec<String> = (0..chunk.len()).map(|i| format!("?{}", i + 3)).collect();
        let sql = format!(
            "{update} AND global_id IN ({}) RETURNING {MESSAGE_COLUMNS}",
            placeholders.join(", ")
        );

        let mut values = Vec::with_capacity(chunk.len() + 2);
        values.push(now.clone());
        values.push(receiver.clone());
        values.extend(chunk.iter().map(|id| Value::Integer(*id)));

        let mut stmt = tx.prepare(&sql)?;
        let updated = stmt
            .query_map(params_from_iter(values.iter()), MessageRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.extend(updated);
    }
    tx.commit()?;

    let mut messages = rows
        .into_iter()
        .map(Message::try_from)
        .collect::<Result<Vec<_>>>()?;
    messages.sort_by_key(|m| m.global_id);
    Ok(messages)
}
