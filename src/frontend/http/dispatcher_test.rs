use std::sync::Arc;

use hyper::{Method, Response, StatusCode as HttpStatus};
use serde_json::{Value, json};

use super::dispatcher::{respond, status_for};
use crate::engine::Engine;
use crate::engine::errors::EngineError;
use crate::frontend::context::FrontendContext;
use crate::logging::init_for_tests;
use crate::shared::response::StatusCode;
use crate::test_helpers::provision;

fn context(token: Option<&str>) -> Arc<FrontendContext> {
    init_for_tests();
    let engine = Engine::in_memory().unwrap();
    provision(&engine, "acme");
    FrontendContext::new(engine, token.map(str::to_string), "127.0.0.1:0")
}

fn json_body(resp: &Response<String>) -> Value {
    serde_json::from_str(resp.body()).unwrap()
}

async fn command(ctx: &Arc<FrontendContext>, auth: Option<&str>, body: Value) -> Response<String> {
    respond(Arc::clone(ctx), &Method::POST, "/command", auth, body.to_string().as_bytes()).await
}

#[tokio::test]
async fn health_check_is_open() {
    let ctx = context(Some("secret"));
    let resp = respond(ctx, &Method::GET, "/health", None, b"").await;
    assert_eq!(resp.status(), HttpStatus::OK);
    assert_eq!(json_body(&resp)["result"], json!("ok"));
}

#[tokio::test]
async fn command_requires_bearer_token_when_configured() {
    let ctx = context(Some("secret"));

    let resp = command(&ctx, None, json!({"op": "ping"})).await;
    assert_eq!(resp.status(), HttpStatus::UNAUTHORIZED);

    let resp = command(&ctx, Some("Bearer wrong"), json!({"op": "ping"})).await;
    assert_eq!(resp.status(), HttpStatus::UNAUTHORIZED);

    let resp = command(&ctx, Some("Bearer secret"), json!({"op": "ping"})).await;
    assert_eq!(resp.status(), HttpStatus::OK);
    assert_eq!(json_body(&resp), json!({"status": 200, "message": "OK", "result": "pong"}));
}

#[tokio::test]
async fn malformed_command_is_bad_request() {
    let ctx = context(None);
    let resp = respond(Arc::clone(&ctx), &Method::POST, "/command", None, b"{not json").await;
    assert_eq!(resp.status(), HttpStatus::BAD_REQUEST);
    assert!(json_body(&resp)["message"].as_str().unwrap().starts_with("Invalid command"));

    let resp = command(&ctx, None, json!({"op": "query_builds", "tenant": "acme", "action": "group_by"})).await;
    assert_eq!(resp.status(), HttpStatus::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_tenant_is_not_found() {
    let ctx = context(None);
    let resp = command(&ctx, None, json!({"op": "query_builds", "tenant": "ghost"})).await;
    assert_eq!(resp.status(), HttpStatus::NOT_FOUND);
    assert!(json_body(&resp).get("result").is_none());
}

#[tokio::test]
async fn duplicate_insert_is_conflict_with_constraint_name() {
    let ctx = context(None);
    let insert = json!({
        "op": "insert_integration",
        "tenant": "acme",
        "integration": {"name": "github", "application": "github"}
    });
    assert_eq!(command(&ctx, None, insert.clone()).await.status(), HttpStatus::OK);

    let resp = command(&ctx, None, insert).await;
    assert_eq!(resp.status(), HttpStatus::CONFLICT);
    assert!(json_body(&resp)["message"].as_str().unwrap().contains("integrations.name"));
}

#[tokio::test]
async fn unknown_paths_and_methods() {
    let ctx = context(None);
    let resp = respond(Arc::clone(&ctx), &Method::GET, "/metrics", None, b"").await;
    assert_eq!(resp.status(), HttpStatus::NOT_FOUND);

    let resp = respond(ctx, &Method::GET, "/command", None, b"").await;
    assert_eq!(resp.status(), HttpStatus::METHOD_NOT_ALLOWED);
}

#[test]
fn engine_errors_map_to_statuses() {
    assert_eq!(status_for(&EngineError::validation("bad")), StatusCode::BadRequest);
    assert_eq!(status_for(&EngineError::InvalidTenant("A".into())), StatusCode::BadRequest);
    assert_eq!(status_for(&EngineError::UnknownTenant("ghost".into())), StatusCode::NotFound);
    assert_eq!(
        status_for(&EngineError::Constraint("UNIQUE constraint failed: teams.name".into())),
        StatusCode::Conflict
    );
    assert_eq!(
        status_for(&EngineError::Io(std::io::Error::other("disk"))),
        StatusCode::InternalError
    );
}
