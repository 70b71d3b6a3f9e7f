//! HTTP-level integration tests for calendar events and conflicts.

mod common;

use axum::http::StatusCode;
use axum::Router;
use common::{body_json, get_auth, post_json_auth, put_json_auth, staff};
use serde_json::{json, Value};
use sqlx::PgPool;

fn event_body(name: &str, start: &str, end: &str) -> Value {
    json!({
        "event_name": name,
        "event_type": "on_campus",
        "timestart": start,
        "timeend": end
    })
}

async fn create_event(app: &Router, body: Value) -> Value {
    let response = post_json_auth(app.clone(), "/api/v1/events", body, &staff("teacher")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"].clone()
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_overlapping_events_record_a_conflict(pool: PgPool) {
    let app = common::build_test_app(pool);
    let first = create_event(
        &app,
        event_body("Assembly", "2025-05-01T09:00:00Z", "2025-05-01T10:00:00Z"),
    )
    .await;
    let second = create_event(
        &app,
        event_body("Rehearsal", "2025-05-01T09:30:00Z", "2025-05-01T10:30:00Z"),
    )
    .await;

    let conflicts = second["conflicts"].as_array().unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0]["other_event_id"], first["id"]);

    // Both sides see the pair.
    let response = get_auth(
        app,
        &format!("/api/v1/events/{}/conflicts", first["id"]),
        &staff("teacher"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"].as_array().unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_ignored_status_survives_a_resync(pool: PgPool) {
    let app = common::build_test_app(pool);
    create_event(
        &app,
        event_body("Assembly", "2025-05-01T09:00:00Z", "2025-05-01T10:00:00Z"),
    )
    .await;
    let second = create_event(
        &app,
        event_body("Rehearsal", "2025-05-01T09:30:00Z", "2025-05-01T10:30:00Z"),
    )
    .await;
    let conflict_id = second["conflicts"][0]["conflict_id"].as_i64().unwrap();

    let response = put_json_auth(
        app.clone(),
        &format!("/api/v1/conflicts/{conflict_id}/status"),
        json!({ "status": 1 }),
        &staff("teacher"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = post_json_auth(
        app,
        &format!("/api/v1/events/{}/conflicts/sync", second["id"]),
        json!({}),
        &staff("teacher"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"][0]["conflict_id"], conflict_id);
    assert_eq!(json["data"][0]["status"], 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_unknown_conflict_status_is_rejected(pool: PgPool) {
    let app = common::build_test_app(pool);
    create_event(
        &app,
        event_body("Assembly", "2025-05-01T09:00:00Z", "2025-05-01T10:00:00Z"),
    )
    .await;
    let second = create_event(
        &app,
        event_body("Rehearsal", "2025-05-01T09:30:00Z", "2025-05-01T10:30:00Z"),
    )
    .await;
    let conflict_id = second["conflicts"][0]["conflict_id"].as_i64().unwrap();

    let response = put_json_auth(
        app,
        &format!("/api/v1/conflicts/{conflict_id}/status"),
        json!({ "status": 7 }),
        &staff("teacher"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_check_conflicts_excludes_boundary_touches(pool: PgPool) {
    let app = common::build_test_app(pool);
    let first = create_event(
        &app,
        event_body("Assembly", "2025-05-01T09:00:00Z", "2025-05-01T10:00:00Z"),
    )
    .await;

    let response = get_auth(
        app.clone(),
        "/api/v1/events/check-conflicts?timestart=2025-05-01T09:59:00Z&timeend=2025-05-01T11:00:00Z",
        &staff("teacher"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"][0]["id"], first["id"]);

    let response = get_auth(
        app,
        "/api/v1/events/check-conflicts?timestart=2025-05-01T10:00:00Z&timeend=2025-05-01T11:00:00Z",
        &staff("teacher"),
    )
    .await;
    assert!(body_json(response).await["data"].as_array().unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_only_the_owner_edits_an_event(pool: PgPool) {
    let app = common::build_test_app(pool);
    let event = create_event(
        &app,
        event_body("Assembly", "2025-05-01T09:00:00Z", "2025-05-01T10:00:00Z"),
    )
    .await;

    let response = put_json_auth(
        app,
        &format!("/api/v1/events/{}", event["id"]),
        event_body("Hijacked", "2025-05-01T09:00:00Z", "2025-05-01T10:00:00Z"),
        &staff("someone.else"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_sync_approval_is_for_approvers(pool: PgPool) {
    let app = common::build_test_app(pool);
    let event = create_event(
        &app,
        event_body("Assembly", "2025-05-01T09:00:00Z", "2025-05-01T10:00:00Z"),
    )
    .await;
    let uri = format!("/api/v1/events/{}/sync-approved", event["id"]);

    let response = put_json_auth(app.clone(), &uri, json!({ "approved": true }), &staff("teacher")).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = put_json_auth(app, &uri, json!({ "approved": true }), &staff("head.senior")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["sync_approved"], true);
}
