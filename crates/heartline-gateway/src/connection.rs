use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tracing::{error, info, warn};
use uuid::Uuid;

use heartline_types::auth::{AuthError, verify_token};
use heartline_types::events::{GatewayCommand, GatewayEvent};

use crate::Gateway;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);
const MAX_MISSED_PONGS: u8 = 2;

/// How long an unauthenticated socket may take to send `identify`.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle a connection whose credential was verified at upgrade time.
pub async fn handle_connection_authenticated(socket: WebSocket, gateway: Gateway, user_id: Uuid) {
    let (sender, receiver) = socket.split();
    info!("{} connected to gateway (pre-authenticated)", user_id);
    run_connection_loop(sender, receiver, gateway, user_id).await;
}

/// Handle a connection that upgraded without a credential: the first
/// thing it must do is `identify`.
pub async fn handle_connection(socket: WebSocket, gateway: Gateway) {
    let (mut sender, mut receiver) = socket.split();

    let user_id = match wait_for_identify(&mut receiver, &gateway.jwt_secret).await {
        Ok(user_id) => user_id,
        Err(e) => {
            warn!("WebSocket client failed to identify ({}), closing", e);
            let rejected = GatewayEvent::Error {
                message: e.to_string(),
                code: e.code().to_string(),
            };
            if let Some(text) = encode(&rejected) {
                let _ = sender.send(Message::Text(text.into())).await;
            }
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };

    info!("{} connected to gateway", user_id);
    run_connection_loop(sender, receiver, gateway, user_id).await;
}

async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    gateway: Gateway,
    user_id: Uuid,
) {
    // Register before `ready` so that anything sent to this user after the
    // client sees `ready` is routed here.
    let (handle, mut events_rx) = gateway.dispatcher.register(user_id).await;
    let conn_id = handle.conn_id;
    handle.send(GatewayEvent::Ready { user_id });

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward queued events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_pongs: u8 = 0;

        loop {
            tokio::select! {
                event = events_rx.recv() => {
                    let Some(event) = event else { break };
                    let Some(text) = encode(&event) else { continue };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_pongs = 0;
                    } else {
                        missed_pongs += 1;
                        if missed_pongs >= MAX_MISSED_PONGS {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_pongs);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Default::default())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let recv_gateway = gateway.clone();
    let recv_handle = handle.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        let outbound = recv_gateway.chat.handle(&recv_gateway.dispatcher, user_id, cmd).await;
                        recv_gateway.dispatcher.dispatch(&recv_handle, outbound).await;
                    }
                    Err(e) => {
                        warn!(
                            "{} bad command: {} -- raw: {}",
                            user_id,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                        recv_handle.send(GatewayEvent::Error {
                            message: format!("Malformed command: {}", e),
                            code: "bad_request".into(),
                        });
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    gateway.dispatcher.unregister(user_id, conn_id).await;
    info!("{} disconnected from gateway", user_id);
}

async fn wait_for_identify(
    receiver: &mut SplitStream<WebSocket>,
    jwt_secret: &str,
) -> Result<Uuid, AuthError> {
    let identify = async {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if let Ok(GatewayCommand::Identify { token }) = serde_json::from_str::<GatewayCommand>(&text) {
                        return verify_token(jwt_secret, &token);
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        Err(AuthError::Missing)
    };

    tokio::time::timeout(IDENTIFY_TIMEOUT, identify)
        .await
        .unwrap_or(Err(AuthError::Missing))
}

fn encode(event: &GatewayEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(text) => Some(text),
        Err(e) => {
            error!("failed to encode {} event: {}", event.name(), e);
            None
        }
    }
}
