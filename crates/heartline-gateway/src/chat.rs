use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use heartline_db::{Database, StoreError};
use heartline_types::events::{DeliveryReceipt, GatewayCommand, GatewayEvent, ReadReceipt};
use heartline_types::models::{Message, MessageType};

use crate::dispatcher::{Dispatcher, Outbound};

/// Page size for `get_messages` when the client does not ask for one.
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Conversation not found")]
    NotFound,

    #[error("Not a participant of this conversation")]
    NotAuthorized,

    #[error("Sender and receiver are not the two parties of this conversation")]
    InvalidParticipants,

    #[error("Message body must not be empty")]
    EmptyBody,

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<StoreError> for ChatError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => Self::NotFound,
            StoreError::InvalidParticipants => Self::InvalidParticipants,
            other => Self::Store(other),
        }
    }
}

impl ChatError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::NotAuthorized => "not_authorized",
            Self::InvalidParticipants => "invalid_participants",
            Self::EmptyBody => "bad_request",
            Self::Store(_) | Self::Join(_) => "internal",
        }
    }

    pub fn to_event(&self) -> GatewayEvent {
        let message = match self {
            // Keep storage details out of client-facing errors.
            Self::Store(_) | Self::Join(_) => "Internal error, please retry".to_string(),
            other => other.to_string(),
        };
        GatewayEvent::Error {
            message,
            code: self.code().to_string(),
        }
    }
}

/// Chat command handlers. Each handler finishes its store writes before it
/// returns, and hands back the events to emit instead of sending them.
#[derive(Clone)]
pub struct ChatService {
    db: Arc<Database>,
    history_limit_max: u32,
}

impl ChatService {
    pub fn new(db: Arc<Database>, history_limit_max: u32) -> Self {
        Self {
            db,
            history_limit_max: history_limit_max.max(1),
        }
    }

    /// Run one command for `caller`. Failures become an `error` event for
    /// the caller; nothing else is emitted in that case.
    pub async fn handle(&self, dispatcher: &Dispatcher, caller: Uuid, cmd: GatewayCommand) -> Vec<Outbound> {
        let result = match cmd {
            GatewayCommand::Identify { .. } => {
                debug!("{} sent identify on an authenticated connection, ignoring", caller);
                Ok(vec![])
            }
            GatewayCommand::SendMessage {
                conversation_id,
                receiver_id,
                message_type,
                body,
            } => {
                self.send_message(dispatcher, caller, conversation_id, receiver_id, message_type, body)
                    .await
            }
            GatewayCommand::MarkDelivered { message_ids } => self.mark_delivered(caller, message_ids).await,
            GatewayCommand::MarkRead { message_ids } => self.mark_read(caller, message_ids).await,
            GatewayCommand::GetMessages {
                conversation_id,
                limit,
                before_sequence_id,
            } => {
                self.get_messages(caller, conversation_id, limit, before_sequence_id)
                    .await
            }
        };

        match result {
            Ok(outbound) => outbound,
            Err(e) => {
                match &e {
                    ChatError::Store(_) | ChatError::Join(_) => error!("{} command failed: {}", caller, e),
                    _ => warn!("{} command rejected: {}", caller, e),
                }
                vec![Outbound::caller(e.to_event())]
            }
        }
    }

    /// Persist a message from `caller`. The caller always gets
    /// `message_sent` first. An online receiver gets the message marked
    /// delivered right away, and the caller then gets `message_delivered`.
    pub async fn send_message(
        &self,
        dispatcher: &Dispatcher,
        caller: Uuid,
        conversation_id: Uuid,
        receiver_id: Uuid,
        message_type: MessageType,
        body: String,
    ) -> Result<Vec<Outbound>, ChatError> {
        if body.trim().is_empty() {
            return Err(ChatError::EmptyBody);
        }

        let db = self.db.clone();
        let message = tokio::task::spawn_blocking(move || {
            db.append_message(conversation_id, caller, receiver_id, message_type, &body)
        })
        .await??;

        info!(
            "{} -> {} message {} (seq {} in {})",
            caller, receiver_id, message.global_id, message.sequence_id, conversation_id
        );

        let mut outbound = vec![Outbound::caller(GatewayEvent::MessageSent(message.clone()))];

        if !dispatcher.is_online(receiver_id).await {
            debug!("{} is offline, message {} stays undelivered", receiver_id, message.global_id);
            outbound.push(Outbound::user(receiver_id, GatewayEvent::NewMessage(message)));
            return Ok(outbound);
        }

        let db = self.db.clone();
        let id = message.global_id;
        let delivered = tokio::task::spawn_blocking(move || db.mark_delivered(&[id], receiver_id)).await??;

        match delivered.into_iter().next() {
            Some(updated) => {
                let receipt = DeliveryReceipt::for_message(&updated);
                outbound.push(Outbound::user(receiver_id, GatewayEvent::NewMessage(updated)));
                if let Some(receipt) = receipt {
                    outbound.push(Outbound::caller(GatewayEvent::MessageDelivered(receipt)));
                }
            }
            None => outbound.push(Outbound::user(receiver_id, GatewayEvent::NewMessage(message))),
        }
        Ok(outbound)
    }

    /// Mark messages addressed to `caller` as delivered and tell each sender.
    pub async fn mark_delivered(&self, caller: Uuid, message_ids: Vec<i64>) -> Result<Vec<Outbound>, ChatError> {
        let db = self.db.clone();
        let updated = tokio::task::spawn_blocking(move || db.mark_delivered(&message_ids, caller)).await??;
        debug!("{} marked {} messages delivered", caller, updated.len());
        Ok(delivery_receipts(&updated))
    }

    /// Mark messages addressed to `caller` as read and tell each sender.
    pub async fn mark_read(&self, caller: Uuid, message_ids: Vec<i64>) -> Result<Vec<Outbound>, ChatError> {
        let db = self.db.clone();
        let updated = tokio::task::spawn_blocking(move || db.mark_read(&message_ids, caller)).await??;
        debug!("{} marked {} messages read", caller, updated.len());

        Ok(updated
            .iter()
            .filter_map(|m| {
                ReadReceipt::for_message(m)
                    .map(|receipt| Outbound::user(m.sender_id, GatewayEvent::MessageRead(receipt)))
            })
            .collect())
    }

    /// Return a page of history to a party of the conversation. Messages in
    /// the page that were waiting for `caller` count as delivered now.
    pub async fn get_messages(
        &self,
        caller: Uuid,
        conversation_id: Uuid,
        limit: Option<u32>,
        before_sequence_id: Option<i64>,
    ) -> Result<Vec<Outbound>, ChatError> {
        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, self.history_limit_max);

        let db = self.db.clone();
        let (history, delivered) = tokio::task::spawn_blocking(move || {
            let relationship = db
                .get_relationship(conversation_id)?
                .ok_or(ChatError::NotFound)?;
            if !relationship.is_party(caller) {
                return Err(ChatError::NotAuthorized);
            }

            let history = db.message_history(conversation_id, limit, before_sequence_id)?;
            let pending: Vec<i64> = history
                .iter()
                .filter(|m| m.receiver_id == caller && !m.delivered)
                .map(|m| m.global_id)
                .collect();
            let delivered = db.mark_delivered(&pending, caller)?;
            Ok((history, delivered))
        })
        .await??;

        debug!(
            "{} fetched {} messages from {} ({} newly delivered)",
            caller,
            history.len(),
            conversation_id,
            delivered.len()
        );

        let mut outbound = vec![Outbound::caller(GatewayEvent::MessagesHistory(history))];
        outbound.extend(delivery_receipts(&delivered));
        Ok(outbound)
    }
}

fn delivery_receipts(messages: &[Message]) -> Vec<Outbound> {
    messages
        .iter()
        .filter_map(|m| {
            DeliveryReceipt::for_message(m)
                .map(|receipt| Outbound::user(m.sender_id, GatewayEvent::MessageDelivered(receipt)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use heartline_types::models::{Relationship, RelationshipState};

    use super::*;
    use crate::dispatcher::Recipient;

    struct Fixture {
        chat: ChatService,
        dispatcher: Dispatcher,
        conversation: Uuid,
        alice: Uuid,
        bob: Uuid,
    }

    fn fixture() -> Fixture {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();
        let rel = Relationship {
            id: Uuid::new_v4(),
            user1: alice,
            user2: bob,
            state: RelationshipState::Matched,
            initiator: bob,
            meeting_place: None,
            place_chosen_by: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        db.create_relationship(&rel).unwrap();

        Fixture {
            chat: ChatService::new(db, 200),
            dispatcher: Dispatcher::new(),
            conversation: rel.id,
            alice,
            bob,
        }
    }

    fn text(f: &Fixture, to: Uuid, body: &str) -> GatewayCommand {
        GatewayCommand::SendMessage {
            conversation_id: f.conversation,
            receiver_id: to,
            message_type: MessageType::Text,
            body: body.to_string(),
        }
    }

    #[tokio::test]
    async fn send_to_offline_receiver_stays_undelivered() {
        let f = fixture();
        let out = f
            .chat
            .handle(&f.dispatcher, f.alice, text(&f, f.bob, "hi"))
            .await;

        assert_eq!(out.len(), 2);
        let GatewayEvent::MessageSent(sent) = &out[0].event else {
            panic!("expected message_sent first, got {:?}", out[0]);
        };
        assert_eq!(out[0].to, Recipient::Caller);
        assert_eq!(sent.sequence_id, 1);
        assert!(!sent.delivered);
        assert_eq!(out[1].to, Recipient::User(f.bob));
        assert!(matches!(out[1].event, GatewayEvent::NewMessage(_)));
    }

    #[tokio::test]
    async fn send_to_online_receiver_is_delivered_after_ack() {
        let f = fixture();
        let (_bob_conn, _bob_rx) = f.dispatcher.register(f.bob).await;

        let out = f
            .chat
            .handle(&f.dispatcher, f.alice, text(&f, f.bob, "hi"))
            .await;

        let names: Vec<_> = out.iter().map(|o| (o.to, o.event.name())).collect();
        assert_eq!(
            names,
            vec![
                (Recipient::Caller, "message_sent"),
                (Recipient::User(f.bob), "new_message"),
                (Recipient::Caller, "message_delivered"),
            ]
        );
        let GatewayEvent::NewMessage(delivered) = &out[1].event else {
            unreachable!()
        };
        assert!(delivered.delivered);
        let GatewayEvent::MessageDelivered(receipt) = &out[2].event else {
            unreachable!()
        };
        assert_eq!(Some(receipt.delivered_at), delivered.delivered_at);
    }

    #[tokio::test]
    async fn outsiders_and_bad_input_get_errors() {
        let f = fixture();
        let stranger = Uuid::new_v4();

        let out = f
            .chat
            .handle(&f.dispatcher, stranger, text(&f, f.bob, "hi"))
            .await;
        assert_eq!(
            out,
            vec![Outbound::caller(ChatError::InvalidParticipants.to_event())]
        );

        let out = f
            .chat
            .handle(&f.dispatcher, f.alice, text(&f, f.bob, "   "))
            .await;
        assert!(matches!(&out[0].event, GatewayEvent::Error { code, .. } if code == "bad_request"));

        let history = GatewayCommand::GetMessages {
            conversation_id: f.conversation,
            limit: None,
            before_sequence_id: None,
        };
        let out = f.chat.handle(&f.dispatcher, stranger, history).await;
        assert!(matches!(&out[0].event, GatewayEvent::Error { code, .. } if code == "not_authorized"));

        let unknown = GatewayCommand::GetMessages {
            conversation_id: Uuid::new_v4(),
            limit: None,
            before_sequence_id: None,
        };
        let out = f.chat.handle(&f.dispatcher, f.alice, unknown).await;
        assert!(matches!(&out[0].event, GatewayEvent::Error { code, .. } if code == "not_found"));
    }

    #[tokio::test]
    async fn fetching_history_delivers_pending_messages() {
        let f = fixture();
        for body in ["one", "two"] {
            f.chat
                .handle(&f.dispatcher, f.alice, text(&f, f.bob, body))
                .await;
        }

        let out = f
            .chat
            .get_messages(f.bob, f.conversation, Some(10), None)
            .await
            .unwrap();

        let GatewayEvent::MessagesHistory(history) = &out[0].event else {
            panic!("expected history first, got {:?}", out[0]);
        };
        assert_eq!(history.iter().map(|m| m.sequence_id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(out.len(), 3);
        assert!(out[1..]
            .iter()
            .all(|o| o.to == Recipient::User(f.alice) && o.event.name() == "message_delivered"));

        // The sender fetching the same page delivers nothing.
        let out = f
            .chat
            .get_messages(f.alice, f.conversation, None, None)
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
    }

    #[tokio::test]
    async fn read_receipts_go_to_the_sender_once() {
        let f = fixture();
        let out = f
            .chat
            .handle(&f.dispatcher, f.alice, text(&f, f.bob, "hi"))
            .await;
        let GatewayEvent::MessageSent(sent) = &out[0].event else {
            unreachable!()
        };

        let out = f.chat.mark_read(f.bob, vec![sent.global_id]).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, Recipient::User(f.alice));
        assert!(matches!(out[0].event, GatewayEvent::MessageRead(_)));

        assert!(f.chat.mark_read(f.bob, vec![sent.global_id]).await.unwrap().is_empty());
        // Already delivered by the read.
        assert!(f.chat.mark_delivered(f.bob, vec![sent.global_id]).await.unwrap().is_empty());
    }
}
