use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Message, MessageType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReceipt {
    pub id: i64,
    pub sequence_id: i64,
    pub delivered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub id: i64,
    pub sequence_id: i64,
    pub read_at: DateTime<Utc>,
}

impl DeliveryReceipt {
    /// Receipt for a message that has a delivery timestamp.
    pub fn for_message(message: &Message) -> Option<Self> {
        message.delivered_at.map(|delivered_at| Self {
            id: message.global_id,
            sequence_id: message.sequence_id,
            delivered_at,
        })
    }
}

impl ReadReceipt {
    pub fn for_message(message: &Message) -> Option<Self> {
        message.read_at.map(|read_at| Self {
            id: message.global_id,
            sequence_id: message.sequence_id,
            read_at,
        })
    }
}

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid },

    /// Ack to the sender: the message is durably stored.
    MessageSent(Message),

    /// A message addressed to this user.
    NewMessage(Message),

    /// One of this user's messages reached its receiver.
    MessageDelivered(DeliveryReceipt),

    /// One of this user's messages was read by its receiver.
    MessageRead(ReadReceipt),

    /// Reply to `get_messages`, ascending by sequence id.
    MessagesHistory(Vec<Message>),

    /// A command from this connection was rejected.
    Error { message: String, code: String },
}

impl GatewayEvent {
    /// Wire name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ready { .. } => "ready",
            Self::MessageSent(_) => "message_sent",
            Self::NewMessage(_) => "new_message",
            Self::MessageDelivered(_) => "message_delivered",
            Self::MessageRead(_) => "message_read",
            Self::MessagesHistory(_) => "messages_history",
            Self::Error { .. } => "error",
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection when no credential came with the upgrade
    Identify { token: String },

    SendMessage {
        conversation_id: Uuid,
        receiver_id: Uuid,
        #[serde(default)]
        message_type: MessageType,
        #[serde(alias = "messageText")]
        body: String,
    },

    MarkDelivered { message_ids: Vec<i64> },

    MarkRead { message_ids: Vec<i64> },

    GetMessages {
        conversation_id: Uuid,
        #[serde(default)]
        limit: Option<u32>,
        #[serde(default)]
        before_sequence_id: Option<i64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_message_parses_wire_shape() {
        let conversation = Uuid::new_v4();
        let receiver = Uuid::new_v4();
        let raw = format!(
            r#"{{"type":"send_message","data":{{"conversationId":"{conversation}","receiverId":"{receiver}","messageType":"image","body":"https://cdn/x.jpg"}}}}"#
        );
        let cmd: GatewayCommand = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            cmd,
            GatewayCommand::SendMessage {
                conversation_id: conversation,
                receiver_id: receiver,
                message_type: MessageType::Image,
                body: "https://cdn/x.jpg".into(),
            }
        );
    }

    #[test]
    fn send_message_defaults_to_text_and_accepts_message_text() {
        let raw = format!(
            r#"{{"type":"send_message","data":{{"conversationId":"{}","receiverId":"{}","messageText":"hi"}}}}"#,
            Uuid::new_v4(),
            Uuid::new_v4()
        );
        match serde_json::from_str::<GatewayCommand>(&raw).unwrap() {
            GatewayCommand::SendMessage { message_type, body, .. } => {
                assert_eq!(message_type, MessageType::Text);
                assert_eq!(body, "hi");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn get_messages_cursor_is_optional() {
        let raw = format!(
            r#"{{"type":"get_messages","data":{{"conversationId":"{}"}}}}"#,
            Uuid::new_v4()
        );
        match serde_json::from_str::<GatewayCommand>(&raw).unwrap() {
            GatewayCommand::GetMessages { limit, before_sequence_id, .. } => {
                assert!(limit.is_none());
                assert!(before_sequence_id.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn delivery_receipt_uses_camel_case() {
        let event = GatewayEvent::MessageDelivered(DeliveryReceipt {
            id: 7,
            sequence_id: 3,
            delivered_at: Utc::now(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "message_delivered");
        assert_eq!(json["data"]["sequenceId"], 3);
        assert!(json["data"]["deliveredAt"].is_string());
    }

    #[test]
    fn error_event_shape() {
        let event = GatewayEvent::Error {
            message: "Not authorized for this match".into(),
            code: "not_authorized".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["data"]["code"], "not_authorized");
    }
}
