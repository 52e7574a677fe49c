//! Pool management routes.

use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};

use api_proxy_auth::MockGatekeeper;
use api_proxy_core::{Protocol, TargetConfig};
use api_proxy_gateway::{
    create_router, BackendFactory, GatewayConfig, GatewayState, TargetRegistry,
};

fn server() -> TestServer {
    let config = GatewayConfig::default();
    let registry = TargetRegistry::new(
        vec![TargetConfig::single(
            "catalog",
            Protocol::Http,
            "http://catalog:8080",
        )],
        Arc::new(MockGatekeeper::new()),
        BackendFactory::new(&config).unwrap(),
    )
    .unwrap();

    let app = create_router(GatewayState::new(Arc::new(registry), config));
    TestServer::new(app).unwrap()
}

#[tokio::test]
async fn health_reports_target_count() {
    let server = server();

    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["targets"], 1);
}

#[tokio::test]
async fn create_pool_then_conflict() {
    let server = server();

    let response = server
        .post("/pool")
        .json(&json!({"id": "sockets", "protocol": "WS", "privilegesLevel": 2}))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["id"], "sockets");
    assert_eq!(body["protocol"], "WS");
    assert_eq!(body["privilegesLevel"], 2);

    let response = server.post("/pool").json(&json!({"id": "sockets"})).await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "conflict");

    let response = server.post("/pool").json(&json!({"id": "catalog"})).await;
    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn create_pool_rejects_empty_id() {
    let server = server();

    let response = server.post("/pool").json(&json!({"id": ""})).await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn members_are_added_listed_and_removed() {
    let server = server();
    server
        .post("/pool")
        .json(&json!({"id": "sockets", "protocol": "WS"}))
        .await
        .assert_status(StatusCode::CREATED);

    for member in ["ws2", "ws1"] {
        server
            .post("/pool/sockets")
            .json(&json!({"targetId": member, "targetUri": format!("http://{member}:9000")}))
            .await
            .assert_status_ok();
    }

    let body: Value = server.get("/pool/sockets").await.json();
    assert_eq!(body["members"], json!(["ws1", "ws2"]));

    server
        .delete("/pool/sockets/ws1")
        .await
        .assert_status(StatusCode::NO_CONTENT);
    // Removing again is a no-op
    server
        .delete("/pool/sockets/ws1")
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let body: Value = server.get("/pool/sockets").await.json();
    assert_eq!(body["members"], json!(["ws2"]));
}

#[tokio::test]
async fn member_operations_on_unknown_pool_are_not_found() {
    let server = server();

    server
        .post("/pool/missing")
        .json(&json!({"targetId": "m", "targetUri": "http://m:1"}))
        .await
        .assert_status_not_found();
    server
        .delete("/pool/missing/m")
        .await
        .assert_status_not_found();
    server.delete("/pool/missing").await.assert_status_not_found();
    server.get("/pool/missing").await.assert_status_not_found();
}

#[tokio::test]
async fn member_operations_on_single_target_are_invalid_type() {
    let server = server();

    let response = server
        .post("/pool/catalog")
        .json(&json!({"targetId": "m", "targetUri": "http://m:1"}))
        .await;
    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "invalid_type");

    server
        .delete("/pool/catalog/m")
        .await
        .assert_status_bad_request();
    server.delete("/pool/catalog").await.assert_status_bad_request();
}

#[tokio::test]
async fn invalid_member_uri_is_bad_request() {
    let server = server();
    server
        .post("/pool")
        .json(&json!({"id": "sockets"}))
        .await
        .assert_status(StatusCode::CREATED);

    let response = server
        .post("/pool/sockets")
        .json(&json!({"targetId": "m", "targetUri": "not a url"}))
        .await;
    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn delete_pool() {
    let server = server();
    server
        .post("/pool")
        .json(&json!({"id": "sockets"}))
        .await
        .assert_status(StatusCode::CREATED);

    server
        .delete("/pool/sockets")
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server.get("/pool/sockets").await.assert_status_not_found();
}
