//! Database row types. These map directly to SQLite rows.
//! Converted into heartline-types models at the store boundary.

use rusqlite::Row;

use heartline_types::models::{Message, Relationship};

use crate::{StoreError, parse_ts, parse_uuid};

pub(crate) const RELATIONSHIP_COLUMNS: &str = "id, user1, user2, state, initiator, meeting_place, \
     place_chosen_by, version, created_at, updated_at";

pub(crate) const MESSAGE_COLUMNS: &str = "global_id, conversation_id, sender_id, receiver_id, \
     sequence_id, message_type, body, delivered, delivered_at, read_at, sent_at";

pub struct RelationshipRow {
    pub id: String,
    pub user1: String,
    pub user2: String,
    pub state: String,
    pub initiator: String,
    pub meeting_place: Option<String>,
    pub place_chosen_by: Option<String>,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl RelationshipRow {
    /// Expects the columns in `RELATIONSHIP_COLUMNS` order.
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user1: row.get(1)?,
            user2: row.get(2)?,
            state: row.get(3)?,
            initiator: row.get(4)?,
            meeting_place: row.get(5)?,
            place_chosen_by: row.get(6)?,
            version: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

impl TryFrom<RelationshipRow> for Relationship {
    type Error = StoreError;

    fn try_from(row: RelationshipRow) -> Result<Self, Self::Error> {
        Ok(Relationship {
            id: parse_uuid(&row.id)?,
            user1: parse_uuid(&row.user1)?,
            user2: parse_uuid(&row.user2)?,
            state: row
                .state
                .parse()
                .map_err(|e| StoreError::Corrupt(format!("relationship {}: {}", row.id, e)))?,
            initiator: parse_uuid(&row.initiator)?,
            meeting_place: row.meeting_place.as_deref().map(parse_uuid).transpose()?,
            place_chosen_by: row.place_chosen_by.as_deref().map(parse_uuid).transpose()?,
            version: row.version,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}

pub struct MessageRow {
    pub global_id: i64,
    pub conversation_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub sequence_id: i64,
    pub message_type: String,
    pub body: String,
    pub delivered: bool,
    pub delivered_at: Option<String>,
    pub read_at: Option<String>,
    pub sent_at: String,
}

impl MessageRow {
    /// Expects the columns in `MESSAGE_COLUMNS` order.
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            global_id: row.get(0)?,
            conversation_id: row.get(1)?,
            sender_id: row.get(2)?,
            receiver_id: row.get(3)?,
            sequence_id: row.get(4)?,
            message_type: row.get(5)?,
            body: row.get(6)?,
            delivered: row.get(7)?,
            delivered_at: row.get(8)?,
            read_at: row.get(9)?,
            sent_at: row.get(10)?,
        })
    }
}

impl TryFrom<MessageRow> for Message {
    type Error = StoreError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(Message {
            global_id: row.global_id,
            conversation_id: parse_uuid(&row.conversation_id)?,
            sender_id: parse_uuid(&row.sender_id)?,
            receiver_id: parse_uuid(&row.receiver_id)?,
            sequence_id: row.sequence_id,
            message_type: row
                .message_type
                .parse()
                .map_err(|e| StoreError::Corrupt(format!("message {}: {}", row.global_id, e)))?,
            body: row.body,
            delivered: row.delivered,
            delivered_at: row.delivered_at.as_deref().map(parse_ts).transpose()?,
            read_at: row.read_at.as_deref().map(parse_ts).transpose()?,
            sent_at: parse_ts(&row.sent_at)?,
        })
    }
}
