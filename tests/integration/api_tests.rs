// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{create_test_app, TestApp};
use super::helpers::{ASMITH, JDOE};
use autoconnect::domain::models::queue_entry::EntryStatus;
use autoconnect::presentation::routes;
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};

fn server(app: &TestApp) -> TestServer {
    TestServer::new(routes::app(app.surface.clone())).unwrap()
}

#[tokio::test]
async fn test_health_and_version() {
    let app = create_test_app();
    let server = server(&app);

    let response = server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.text(), "OK");

    let response = server.get("/v1/version").await;
    assert_eq!(response.text(), env!("CARGO_PKG_VERSION"));
}

/// 消息端点与内部分派使用同一套动作协议
#[tokio::test]
async fn test_message_endpoint() {
    let app = create_test_app();
    let server = server(&app);

    let response = server
        .post("/api/message")
        .json(&json!({ "action": "addToQueue", "profile": { "profileUrl": JDOE, "name": "Jane" } }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>(), json!({ "success": true }));

    let response = server
        .post("/api/message")
        .json(&json!({ "action": "selfDestruct" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>(), json!({ "error": "Unknown action" }));

    let response = server
        .post("/api/message")
        .json(&json!({ "action": "isInQueue", "targetUrl": JDOE }))
        .await;
    assert_eq!(response.json::<Value>()["inQueue"], true);
}

/// 重复添加返回400，错误信息与控制消息一致
#[tokio::test]
async fn test_add_to_queue_endpoint() {
    let app = create_test_app();
    let server = server(&app);

    let response = server
        .post("/api/queue")
        .json(&json!({ "targetUrl": JDOE, "displayName": "Jane Doe", "headline": "Engineer" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["item"]["targetUrl"], JDOE);
    assert_eq!(body["item"]["status"], "pending");

    let response = server
        .post("/api/queue")
        .json(&json!({ "targetUrl": format!("{}?trk=feed", JDOE) }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>(), json!({ "error": "Already in queue" }));

    let response = server
        .post("/api/queue")
        .json(&json!({ "targetUrl": "linkedin" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_status_lists_newest_first() {
    let app = create_test_app();
    let server = server(&app);
    server.post("/api/queue").json(&json!({ "targetUrl": JDOE })).await;
    server.post("/api/queue").json(&json!({ "targetUrl": ASMITH })).await;

    let response = server.get("/api/status").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["total"], 2);
    assert_eq!(body["pending"], 2);
    assert_eq!(body["queue"][0]["targetUrl"], ASMITH);
    assert_eq!(body["queue"][1]["targetUrl"], JDOE);
    assert_eq!(body["isProcessing"], false);
}

#[tokio::test]
async fn test_retry_and_remove_endpoints() {
    let app = create_test_app();
    let server = server(&app);
    server.post("/api/queue").json(&json!({ "targetUrl": JDOE })).await;
    let id = app.queue.list_entries(None).await.unwrap()[0].id.clone();

    let response = server.post(&format!("/api/queue/{}/retry", id)).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>(), json!({ "error": "Item not found" }));

    app.queue
        .update_entry(None, &id, |entry| entry.mark_failed("Send button not found"))
        .await
        .unwrap();
    let response = server.post(&format!("/api/queue/{}/retry", id)).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let entry = app.queue.find_by_url(None, JDOE).await.unwrap().unwrap();
    assert_eq!(entry.status, EntryStatus::Pending);

    let response = server.delete(&format!("/api/queue/{}", id)).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let response = server.delete(&format!("/api/queue/{}", id)).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(app.queue.list_entries(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_start_on_empty_queue_and_clear() {
    let app = create_test_app();
    let server = server(&app);

    let response = server.post("/api/start").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(
        response.json::<Value>(),
        json!({ "success": true, "isProcessing": false })
    );

    server.post("/api/queue").json(&json!({ "targetUrl": JDOE })).await;
    let response = server.post("/api/clear").await;
    assert_eq!(
        response.json::<Value>(),
        json!({ "success": true, "removed": 1 })
    );

    let response = server.post("/api/pause").await;
    assert_eq!(response.status_code(), StatusCode::OK);
}
