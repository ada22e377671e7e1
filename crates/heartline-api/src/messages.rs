use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use tracing::debug;
use uuid::Uuid;

use heartline_match::MatchError;
use heartline_types::api::{HistoryQuery, HistoryResponse};

use crate::auth::{AppState, AuthUser};
use crate::error::ApiError;

fn default_limit() -> u32 {
    50
}

/// History of one conversation, ascending by sequence id. Only its two
/// parties may read it. Unlike the gateway fetch this does not mark
/// anything delivered.
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let relationship = state.matches.relationship(conversation_id).await?;
    if !relationship.is_party(user_id) {
        return Err(MatchError::NotAuthorized.into());
    }

    let limit = query
        .limit
        .unwrap_or_else(default_limit)
        .clamp(1, state.history_limit_max);
    let before = query.before_sequence_id;

    // Run blocking DB query off the async runtime
    let db = state.db.clone();
    let messages =
        tokio::task::spawn_blocking(move || db.message_history(conversation_id, limit, before)).await??;

    debug!("{} read {} messages from {}", user_id, messages.len(), conversation_id);
    Ok(Json(messages))
}
