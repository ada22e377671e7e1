use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Where a pair of users currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipState {
    /// user1 swiped on user2, waiting for user2.
    Pending,
    Matched,
    Unmatched,
    /// user1 sent a heart request to user2, waiting for user2.
    NudgeSent,
}

impl RelationshipState {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Matched => "matched",
            Self::Unmatched => "unmatched",
            Self::NudgeSent => "nudge",
        }
    }
}

impl fmt::Display for RelationshipState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipState {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "matched" => Ok(Self::Matched),
            "unmatched" => Ok(Self::Unmatched),
            "nudge" => Ok(Self::NudgeSent),
            other => Err(UnknownVariant {
                kind: "relationship state",
                value: other.to_string(),
            }),
        }
    }
}

/// The single record tracking two users. `user1`/`user2` carry direction:
/// for `Pending` and `NudgeSent`, `user1` is the one waiting on `user2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub id: Uuid,
    pub user1: Uuid,
    pub user2: Uuid,
    #[serde(rename = "status")]
    pub state: RelationshipState,
    pub initiator: Uuid,
    pub meeting_place: Option<Uuid>,
    pub place_chosen_by: Option<Uuid>,
    #[serde(skip)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Relationship {
    pub fn is_party(&self, user_id: Uuid) -> bool {
        self.user1 == user_id || self.user2 == user_id
    }

    /// The other side of the pair, or `None` if `user_id` is not a party.
    pub fn other_party(&self, user_id: Uuid) -> Option<Uuid> {
        if self.user1 == user_id {
            Some(self.user2)
        } else if self.user2 == user_id {
            Some(self.user1)
        } else {
            None
        }
    }

    /// Canonical unordered key for the pair: (smaller, larger).
    pub fn pair_key(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
        if a <= b { (a, b) } else { (b, a) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Video,
    Audio,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

impl FromStr for MessageType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            other => Err(UnknownVariant {
                kind: "message type",
                value: other.to_string(),
            }),
        }
    }
}

/// A chat message. For media types `body` is the media URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "id")]
    pub global_id: i64,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub sequence_id: i64,
    pub message_type: MessageType,
    pub body: String,
    pub delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub sent_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_storage_names_round_trip() {
        for state in [
            RelationshipState::Pending,
            RelationshipState::Matched,
            RelationshipState::Unmatched,
            RelationshipState::NudgeSent,
        ] {
            assert_eq!(state.as_str().parse::<RelationshipState>().unwrap(), state);
        }
        assert!("blocked".parse::<RelationshipState>().is_err());
    }

    #[test]
    fn pair_key_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(Relationship::pair_key(a, b), Relationship::pair_key(b, a));
    }

    #[test]
    fn relationship_serializes_status_field() {
        let now = Utc::now();
        let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());
        let rel = Relationship {
            id: Uuid::new_v4(),
            user1: u1,
            user2: u2,
            state: RelationshipState::NudgeSent,
            initiator: u1,
            meeting_place: None,
            place_chosen_by: None,
            version: 3,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&rel).unwrap();
        assert_eq!(json["status"], "NudgeSent");
        assert_eq!(json["user1"], u1.to_string());
        assert!(json.get("version").is_none());
        assert_eq!(rel.other_party(u2), Some(u1));
        assert_eq!(rel.other_party(Uuid::new_v4()), None);
    }
}
