use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use heartline_api::auth::AppStateInner;
use heartline_db::Database;
use heartline_types::auth::issue_token;
use heartline_types::models::MessageType;

const SECRET: &str = "api-test-secret";

fn app() -> (Router, Arc<Database>) {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let state = AppStateInner::new(db.clone(), SECRET.to_string(), 200);
    (heartline_api::router(state), db)
}

fn bearer(user: Uuid) -> String {
    let token = issue_token(SECRET, user, chrono::Duration::hours(1)).unwrap();
    format!("Bearer {token}")
}

async fn call(app: &Router, method: Method, uri: &str, user: Option<Uuid>, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        req = req.header(header::AUTHORIZATION, bearer(user));
    }
    let req = match body {
        Some(body) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn requests_without_valid_token_are_rejected() {
    let (app, _db) = app();

    let (status, body) = call(&app, Method::GET, "/matches/my-matches", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "token_required");

    let req = Request::builder()
        .uri("/matches/my-matches")
        .header(header::AUTHORIZATION, "Bearer garbage")
        .body(Body::empty())
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn mutual_heart_requests_match() {
    let (app, _db) = app();
    let (u1, u2) = (Uuid::new_v4(), Uuid::new_v4());

    let (status, body) = call(
        &app,
        Method::POST,
        "/matches/heart-request",
        Some(u1),
        Some(json!({ "targetUserId": u2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["match"], false);
    assert_eq!(body["status"], "NudgeSent");
    assert_eq!(body["relationship"]["user1"], u1.to_string());
    assert_eq!(body["relationship"]["user2"], u2.to_string());

    // Sending it again is rejected.
    let (status, body) = call(
        &app,
        Method::POST,
        "/matches/heart-request",
        Some(u1),
        Some(json!({ "targetUserId": u2 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "already_nudged");

    let (status, body) = call(
        &app,
        Method::POST,
        "/matches/heart-request",
        Some(u2),
        Some(json!({ "targetUserId": u1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["match"], true);
    assert_eq!(body["status"], "Matched");
    assert_eq!(body["outcome"], "matched");

    let (status, body) = call(&app, Method::GET, "/matches/my-matches", Some(u1), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["userId"], u2.to_string());
}

#[tokio::test]
async fn swipe_match_place_and_unmatch() {
    let (app, _db) = app();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let place = Uuid::new_v4();

    let (_, first) = call(&app, Method::POST, "/matches/swipe", Some(a), Some(json!({ "targetUserId": b }))).await;
    assert_eq!(first["status"], "Pending");
    let id = first["relationship"]["id"].as_str().unwrap().to_string();

    let (_, second) = call(
        &app,
        Method::POST,
        "/matches/swipe",
        Some(b),
        Some(json!({ "targetUserId": a, "locationId": place })),
    )
    .await;
    assert_eq!(second["match"], true);
    assert_eq!(second["relationship"]["meetingPlace"], place.to_string());
    assert_eq!(second["relationship"]["placeChosenBy"], b.to_string());

    let other_place = Uuid::new_v4();
    let (status, body) = call(
        &app,
        Method::PUT,
        &format!("/matches/{id}/location"),
        Some(a),
        Some(json!({ "locationId": other_place })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "meeting_place_set");
    assert_eq!(body["relationship"]["placeChosenBy"], a.to_string());

    let stranger = Uuid::new_v4();
    let (status, body) = call(&app, Method::POST, &format!("/matches/{id}/unmatch"), Some(stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "not_authorized");

    let (status, body) = call(&app, Method::POST, &format!("/matches/{id}/unmatch"), Some(b), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Unmatched");

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/matches/{}/unmatch", Uuid::new_v4()),
        Some(b),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn received_hearts_are_paginated_and_declinable() {
    let (app, _db) = app();
    let me = Uuid::new_v4();
    let admirers: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
    for admirer in &admirers {
        call(
            &app,
            Method::POST,
            "/matches/heart-request",
            Some(*admirer),
            Some(json!({ "targetUserId": me })),
        )
        .await;
    }

    let (status, body) = call(&app, Method::GET, "/matches/received-hearts?page=1&limit=2", Some(me), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["requests"].as_array().unwrap().len(), 2);
    assert_eq!(body["pagination"]["total"], 3);
    assert_eq!(body["pagination"]["totalPages"], 2);
    assert_eq!(body["pagination"]["hasMore"], true);

    let match_id = body["requests"][0]["matchId"].as_str().unwrap().to_string();
    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/matches/decline-heart/{match_id}"),
        Some(me),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "declined");

    let (_, body) = call(&app, Method::GET, "/matches/received-hearts", Some(me), None).await;
    assert_eq!(body["pagination"]["total"], 2);
}

#[tokio::test]
async fn self_action_is_a_bad_request() {
    let (app, _db) = app();
    let me = Uuid::new_v4();
    let (status, body) = call(&app, Method::POST, "/matches/pass", Some(me), Some(json!({ "targetUserId": me }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "self_action");
}

#[tokio::test]
async fn message_history_is_for_parties_only() {
    let (app, db) = app();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    call(&app, Method::POST, "/matches/swipe", Some(a), Some(json!({ "targetUserId": b }))).await;
    let (_, matched) = call(&app, Method::POST, "/matches/swipe", Some(b), Some(json!({ "targetUserId": a }))).await;
    let cid: Uuid = matched["relationship"]["id"].as_str().unwrap().parse().unwrap();

    for i in 0..5 {
        db.append_message(cid, a, b, MessageType::Text, &format!("m{i}")).unwrap();
    }

    let (status, body) = call(
        &app,
        Method::GET,
        &format!("/messages/{cid}?limit=2&beforeSequenceId=5"),
        Some(b),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let seqs: Vec<i64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["sequenceId"].as_i64().unwrap())
        .collect();
    assert_eq!(seqs, vec![3, 4]);

    let (status, _) = call(&app, Method::GET, &format!("/messages/{cid}"), Some(Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(&app, Method::GET, &format!("/messages/{}", Uuid::new_v4()), Some(a), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
