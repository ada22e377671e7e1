use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use uuid::Uuid;

use heartline_match::MatchOutcome;
use heartline_types::api::{
    HeartRequestSummary, MatchSummary, MeetingPlaceRequest, Pagination, ReceivedHeartsResponse,
    RelationshipResponse, SwipeRequest, TargetRequest,
};

use crate::auth::{AppState, AuthUser};
use crate::error::ApiError;

const DEFAULT_PAGE_SIZE: u32 = 10;

fn respond(result: MatchOutcome) -> Json<RelationshipResponse> {
    Json(RelationshipResponse {
        is_match: result.outcome.is_match(),
        status: result.relationship.state,
        outcome: result.outcome.as_str().to_string(),
        relationship: result.relationship,
    })
}

pub async fn swipe(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(req): Json<SwipeRequest>,
) -> Result<Json<RelationshipResponse>, ApiError> {
    let result = state
        .matches
        .swipe(user_id, req.target_user_id, req.location_id)
        .await?;
    Ok(respond(result))
}

pub async fn pass(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(req): Json<TargetRequest>,
) -> Result<Json<RelationshipResponse>, ApiError> {
    let result = state.matches.pass(user_id, req.target_user_id).await?;
    Ok(respond(result))
}

pub async fn heart_request(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(req): Json<TargetRequest>,
) -> Result<Json<RelationshipResponse>, ApiError> {
    let result = state.matches.heart_request(user_id, req.target_user_id).await?;
    Ok(respond(result))
}

pub async fn decline_heart(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(relationship_id): Path<Uuid>,
) -> Result<Json<RelationshipResponse>, ApiError> {
    let result = state.matches.decline_heart(user_id, relationship_id).await?;
    Ok(respond(result))
}

pub async fn set_meeting_place(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(relationship_id): Path<Uuid>,
    Json(req): Json<MeetingPlaceRequest>,
) -> Result<Json<RelationshipResponse>, ApiError> {
    let result = state
        .matches
        .set_meeting_place(user_id, relationship_id, req.location_id)
        .await?;
    Ok(respond(result))
}

pub async fn unmatch(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(relationship_id): Path<Uuid>,
) -> Result<Json<RelationshipResponse>, ApiError> {
    let result = state.matches.unmatch(user_id, relationship_id).await?;
    Ok(respond(result))
}

/// Matches seen from the caller's side: `userId` is the other party.
pub async fn my_matches(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<Vec<MatchSummary>>, ApiError> {
    let matches = state.matches.my_matches(user_id).await?;
    Ok(Json(
        matches
            .into_iter()
            .filter_map(|rel| {
                Some(MatchSummary {
                    match_id: rel.id,
                    user_id: rel.other_party(user_id)?,
                    meeting_place: rel.meeting_place,
                    place_chosen_by: rel.place_chosen_by,
                    created_at: rel.created_at,
                })
            })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

pub async fn received_hearts(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ReceivedHeartsResponse>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).max(1);

    let (hearts, total) = state.matches.received_hearts(user_id, page, limit).await?;

    Ok(Json(ReceivedHeartsResponse {
        requests: hearts
            .into_iter()
            .map(|rel| HeartRequestSummary {
                match_id: rel.id,
                from_user_id: rel.user1,
                created_at: rel.updated_at,
            })
            .collect(),
        pagination: Pagination::new(page, limit.min(heartline_match::MAX_PAGE_SIZE), total),
    }))
}
