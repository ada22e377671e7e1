pub mod auth;
pub mod error;
pub mod matches;
pub mod messages;
pub mod middleware;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};

use crate::auth::AppState;
use crate::middleware::require_auth;

/// All authenticated HTTP routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/matches/swipe", post(matches::swipe))
        .route("/matches/pass", post(matches::pass))
        .route("/matches/heart-request", post(matches::heart_request))
        .route("/matches/decline-heart/{relationship_id}", post(matches::decline_heart))
        .route("/matches/{relationship_id}/location", put(matches::set_meeting_place))
        .route("/matches/{relationship_id}/unmatch", post(matches::unmatch))
        .route("/matches/my-matches", get(matches::my_matches))
        .route("/matches/received-hearts", get(matches::received_hearts))
        .route("/messages/{conversation_id}", get(messages::get_messages))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state)
}
