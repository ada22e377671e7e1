//! Realtime chat over WebSocket: presence, command handling and delivery.

pub mod chat;
pub mod connection;
pub mod dispatcher;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use serde::Deserialize;
use tracing::warn;

use heartline_types::api::ErrorBody;
use heartline_types::auth::verify_token;

use crate::chat::ChatService;
use crate::dispatcher::Dispatcher;

/// Everything a gateway connection needs, cloned into each one.
#[derive(Clone)]
pub struct Gateway {
    pub dispatcher: Dispatcher,
    pub chat: ChatService,
    jwt_secret: Arc<str>,
}

impl Gateway {
    pub fn new(dispatcher: Dispatcher, chat: ChatService, jwt_secret: &str) -> Self {
        Self {
            dispatcher,
            chat,
            jwt_secret: Arc::from(jwt_secret),
        }
    }
}

/// `GET /gateway`, ready to merge into the server router.
pub fn router(gateway: Gateway) -> Router {
    Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(gateway)
}

#[derive(Debug, Deserialize)]
pub struct UpgradeQuery {
    pub token: Option<String>,
}

/// A credential in the `Authorization` header or `?token=` is checked
/// before upgrading; without one, the socket must `identify` itself.
pub async fn ws_upgrade(
    State(gateway): State<Gateway>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<UpgradeQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let token = bearer
        .map(|TypedHeader(Authorization(bearer))| bearer.token().to_string())
        .or(query.token);

    let Some(token) = token else {
        return ws
            .on_upgrade(move |socket| connection::handle_connection(socket, gateway))
            .into_response();
    };

    match verify_token(&gateway.jwt_secret, &token) {
        Ok(user_id) => ws
            .on_upgrade(move |socket| connection::handle_connection_authenticated(socket, gateway, user_id))
            .into_response(),
        Err(e) => {
            warn!("gateway upgrade rejected: {}", e);
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorBody {
                    message: e.to_string(),
                    code: e.code().to_string(),
                }),
            )
                .into_response()
        }
    }
}
