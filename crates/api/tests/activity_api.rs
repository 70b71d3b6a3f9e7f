//! HTTP-level integration tests for activities, approval steps, and
//! permissions.

mod common;

use axum::http::StatusCode;
use axum::Router;
use common::{body_json, delete_auth, get_auth, parent, post_json_auth, put_json_auth, staff};
use serde_json::{json, Value};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn activity_body() -> Value {
    json!({
        "activity_name": "Zoo visit",
        "campus": "senior",
        "activity_type": "excursion",
        "location": "City Zoo",
        "timestart": "2025-03-10T09:00:00Z",
        "timeend": "2025-03-10T15:00:00Z",
        "students": ["s1", "s2"],
        "staff_in_charge": "teacher",
        "accompanying_staff": ["aide"],
        "cost": "25.00",
        "transport": "bus",
        "permissions_type": "system"
    })
}

/// Create a draft as `teacher` and return its id.
async fn create_draft(app: &Router) -> i64 {
    let response = post_json_auth(
        app.clone(),
        "/api/v1/activities",
        activity_body(),
        &staff("teacher"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], 1);
    json["data"]["id"].as_i64().unwrap()
}

async fn step_id(app: &Router, activity_id: i64, step_type: &str) -> i64 {
    let response = get_auth(
        app.clone(),
        &format!("/api/v1/activities/{activity_id}"),
        &staff("teacher"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    json["data"]["steps"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["step_type"] == step_type)
        .and_then(|s| s["id"].as_i64())
        .unwrap()
}

async fn approve(app: &Router, activity_id: i64, step: i64, approver: &str) -> (StatusCode, Value) {
    let response = post_json_auth(
        app.clone(),
        &format!("/api/v1/activities/{activity_id}/steps/{step}/approve"),
        json!({ "checked": true }),
        &staff(approver),
    )
    .await;
    let status = response.status();
    (status, body_json(response).await)
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_activity_is_approved_through_the_api(pool: PgPool) {
    let app = common::build_test_app(pool);
    let id = create_draft(&app).await;

    let response = post_json_auth(
        app.clone(),
        &format!("/api/v1/activities/{id}/submit"),
        json!({}),
        &staff("teacher"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status"], 2);

    // The final step is blocked until its prerequisites are done.
    let hoss = step_id(&app, id, "senior_hoss").await;
    let (status, json) = approve(&app, id, hoss, "head.senior").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "CONFLICT");

    let ra = step_id(&app, id, "senior_ra").await;
    let (status, _) = approve(&app, id, ra, "risk.officer").await;
    assert_eq!(status, StatusCode::OK);

    let admin = step_id(&app, id, "senior_admin").await;
    let (status, _) = approve(&app, id, admin, "senior.admin").await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = approve(&app, id, hoss, "head.senior").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], 3);
    assert!(json["data"]["stage"].is_null());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_non_approver_gets_403(pool: PgPool) {
    let app = common::build_test_app(pool);
    let id = create_draft(&app).await;
    post_json_auth(
        app.clone(),
        &format!("/api/v1/activities/{id}/submit"),
        json!({}),
        &staff("teacher"),
    )
    .await;

    let ra = step_id(&app, id, "senior_ra").await;
    let (status, json) = approve(&app, id, ra, "random.teacher").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "PERMISSION_DENIED");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_parents_cannot_create_activities(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response =
        post_json_auth(app, "/api/v1/activities", activity_body(), &parent("p1")).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_end_before_start_is_a_validation_error(pool: PgPool) {
    let app = common::build_test_app(pool);
    let mut body = activity_body();
    body["timeend"] = json!("2025-03-10T08:00:00Z");

    let response = post_json_auth(app, "/api/v1/activities", body, &staff("teacher")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_stale_version_gets_409(pool: PgPool) {
    let app = common::build_test_app(pool);
    let id = create_draft(&app).await;

    let response = get_auth(
        app.clone(),
        &format!("/api/v1/activities/{id}"),
        &staff("teacher"),
    )
    .await;
    let version = body_json(response).await["data"]["version"].as_i64().unwrap();

    let mut first = activity_body();
    first["location"] = json!("Aquarium");
    first["expected_version"] = json!(version);
    let response = put_json_auth(
        app.clone(),
        &format!("/api/v1/activities/{id}"),
        first,
        &staff("teacher"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut second = activity_body();
    second["location"] = json!("Museum");
    second["expected_version"] = json!(version);
    let response = put_json_auth(
        app,
        &format!("/api/v1/activities/{id}"),
        second,
        &staff("teacher"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "CONCURRENT_MODIFICATION");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_deleted_draft_is_no_longer_found(pool: PgPool) {
    let app = common::build_test_app(pool);
    let id = create_draft(&app).await;

    let response = delete_auth(
        app.clone(),
        &format!("/api/v1/activities/{id}"),
        &staff("teacher"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = get_auth(app, &format!("/api/v1/activities/{id}"), &staff("teacher")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_my_activities_lists_what_i_lead(pool: PgPool) {
    let app = common::build_test_app(pool);
    let id = create_draft(&app).await;

    let response = get_auth(app.clone(), "/api/v1/activities", &staff("teacher")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let ids: Vec<i64> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|a| a["id"].as_i64())
        .collect();
    assert_eq!(ids, vec![id]);

    let response = get_auth(app, "/api/v1/activities", &staff("someone.else")).await;
    assert!(body_json(response).await["data"].as_array().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_parent_responses_drive_attendance(pool: PgPool) {
    let app = common::build_test_app(pool);
    let id = create_draft(&app).await;

    let response = post_json_auth(
        app.clone(),
        &format!("/api/v1/activities/{id}/permissions"),
        json!({ "mentors": [
            { "student": "s1", "parent": "p1" },
            { "student": "s2", "parent": "p2" }
        ]}),
        &staff("teacher"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"].as_array().unwrap().len(), 2);

    let response = put_json_auth(
        app.clone(),
        &format!("/api/v1/activities/{id}/permissions/s1"),
        json!({ "response": 1 }),
        &parent("p1"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["response"], 1);

    let response = put_json_auth(
        app.clone(),
        &format!("/api/v1/activities/{id}/permissions/s2"),
        json!({ "response": 2 }),
        &parent("p2"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // p1 is not a parent of s2.
    let response = put_json_auth(
        app.clone(),
        &format!("/api/v1/activities/{id}/permissions/s2"),
        json!({ "response": 1 }),
        &parent("p1"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = get_auth(
        app,
        &format!("/api/v1/activities/{id}/attending"),
        &staff("teacher"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"], json!(["s1"]));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_staff_token_cannot_answer_for_a_parent(pool: PgPool) {
    let app = common::build_test_app(pool);
    let id = create_draft(&app).await;

    let response = put_json_auth(
        app,
        &format!("/api/v1/activities/{id}/permissions/s1"),
        json!({ "response": 1 }),
        &staff("teacher"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
