use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Message, Relationship, RelationshipState};

// -- Relationship actions --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SwipeRequest {
    pub target_user_id: Uuid,
    pub location_id: Option<Uuid>,
}

/// Body shared by pass and heart-request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TargetRequest {
    pub target_user_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MeetingPlaceRequest {
    pub location_id: Uuid,
}

/// Returned by every relationship action.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipResponse {
    /// True only when this action completed a match.
    #[serde(rename = "match")]
    pub is_match: bool,
    pub status: RelationshipState,
    pub outcome: String,
    pub relationship: Relationship,
}

/// One entry of `GET /matches/my-matches`, seen from the caller's side.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub match_id: Uuid,
    pub user_id: Uuid,
    pub meeting_place: Option<Uuid>,
    pub place_chosen_by: Option<Uuid>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartRequestSummary {
    pub match_id: Uuid,
    pub from_user_id: Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
    pub has_more: bool,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let limit_u64 = u64::from(limit.max(1));
        Self {
            page,
            limit,
            total,
            total_pages: total.div_ceil(limit_u64),
            has_more: u64::from(page) * limit_u64 < total,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedHeartsResponse {
    pub requests: Vec<HeartRequestSummary>,
    pub pagination: Pagination,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub limit: Option<u32>,
    pub before_sequence_id: Option<i64>,
}

pub type HistoryResponse = Vec<Message>;

// -- Errors --

/// Error body returned by the HTTP surface.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_reports_remaining_pages() {
        let p = Pagination::new(1, 10, 25);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_more);

        let last = Pagination::new(3, 10, 25);
        assert!(!last.has_more);

        let empty = Pagination::new(1, 10, 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_more);
    }

    #[test]
    fn swipe_request_accepts_camel_case() {
        let target = Uuid::new_v4();
        let body = format!(r#"{{"targetUserId":"{target}"}}"#);
        let req: SwipeRequest = serde_json::from_str(&body).unwrap();
        assert_eq!(req.target_user_id, target);
        assert!(req.location_id.is_none());
    }
}
