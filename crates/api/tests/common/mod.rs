#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use excursions_api::auth::jwt::{issue_token, JwtConfig, Role};
use excursions_api::config::ServerConfig;
use excursions_api::router::build_app_router;
use excursions_api::state::AppState;
use excursions_core::workflow::WorkflowDefinition;
use excursions_events::EventBus;

const WORKFLOW: &str = include_str!("../../../../config/workflow.json");

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            access_token_expiry_mins: 15,
        },
        workflow_config_path: "config/workflow.json".to_string(),
        notification_poll_secs: 30,
        email_domain: "school.local".to_string(),
    }
}

/// Build the full application router over `pool`, with the same middleware
/// stack the binary serves.
pub fn build_test_app(pool: PgPool) -> Router {
    let config = test_config();
    let definition = Arc::new(WorkflowDefinition::from_json(WORKFLOW).unwrap());
    let state = AppState::new(
        pool,
        Arc::new(config.clone()),
        definition,
        Arc::new(EventBus::default()),
    );
    build_app_router(state, &config)
}

/// A valid bearer token for `username` with `role`.
pub fn token(username: &str, role: Role) -> String {
    issue_token(username, role, &test_config().jwt).unwrap()
}

pub fn staff(username: &str) -> String {
    token(username, Role::Staff)
}

pub fn parent(username: &str) -> String {
    token(username, Role::Parent)
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn put_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    send(app, Method::PUT, uri, Some(token), Some(body)).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, Some(token), None).await
}
