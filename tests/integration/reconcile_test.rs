// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{create_test_app, wait_for_status, wait_until};
use super::helpers::{ASMITH, BLEE, JDOE};
use autoconnect::config::settings::AutomationSettings;
use autoconnect::domain::models::queue_entry::{EntryStatus, ProfileCandidate};
use autoconnect::domain::models::user_settings::UserSettings;
use autoconnect::domain::repositories::storage_repository::{
    read_key, write_key, ACCEPTED_CONNECTIONS_KEY, LAST_CONNECTION_CHECK_KEY, LEGACY_QUEUE_KEY,
    QUEUES_KEY,
};
use autoconnect::engines::traits::Routine;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_failed_entry_becomes_connected_and_keeps_error() {
    let app = create_test_app();
    app.runner.push_outcome(json!({
        "succeeded": false,
        "error": "Connect button not found"
    }));
    app.queue
        .add_entry(None, ProfileCandidate::new(JDOE))
        .await
        .unwrap();
    app.scheduler.connect_now().await.unwrap();
    wait_for_status(&app.queue, None, JDOE, EntryStatus::Failed).await;

    app.runner.set_connections(json!({
        "identifiers": ["https://www.linkedin.com/in/JDoe/", "asmith", "asmith"]
    }));
    let report = app.reconciler.reconcile().await.unwrap();

    assert_eq!(report.identifiers, vec!["asmith", "jdoe"]);
    assert_eq!(report.updated, 1);
    let entry = app.queue.find_by_url(None, JDOE).await.unwrap().unwrap();
    assert_eq!(entry.status, EntryStatus::Connected);
    assert_eq!(entry.error.as_deref(), Some("Connect button not found"));
    assert!(entry.connected_at.is_some());

    let accepted: Vec<String> = read_key(app.store.as_ref(), ACCEPTED_CONNECTIONS_KEY)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(accepted, vec!["asmith", "jdoe"]);
    let checked_at: Option<DateTime<Utc>> = read_key(app.store.as_ref(), LAST_CONNECTION_CHECK_KEY)
        .await
        .unwrap();
    assert!(checked_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_repeated_reconcile_writes_queue_only_once() {
    let app = create_test_app();
    app.queue
        .add_entry(None, ProfileCandidate::new(JDOE))
        .await
        .unwrap();
    app.context.set_owner("me").unwrap();
    app.queue
        .add_entry(Some("me"), ProfileCandidate::new(ASMITH))
        .await
        .unwrap();
    app.runner
        .set_connections(json!(["jdoe", "asmith"]));

    let legacy_writes = app.store.writes_for(LEGACY_QUEUE_KEY);
    let queues_writes = app.store.writes_for(QUEUES_KEY);

    let first = app.reconciler.reconcile().await.unwrap();
    assert_eq!(first.updated, 2);
    assert_eq!(app.store.writes_for(LEGACY_QUEUE_KEY), legacy_writes + 1);
    assert_eq!(app.store.writes_for(QUEUES_KEY), queues_writes + 1);

    let second = app.reconciler.reconcile().await.unwrap();
    assert_eq!(second.updated, 0);
    assert_eq!(app.store.writes_for(LEGACY_QUEUE_KEY), legacy_writes + 1);
    assert_eq!(app.store.writes_for(QUEUES_KEY), queues_writes + 1);
    assert_eq!(app.store.writes_for(ACCEPTED_CONNECTIONS_KEY), 2);

    let owned = app.queue.find_by_url(Some("me"), ASMITH).await.unwrap().unwrap();
    assert_eq!(owned.status, EntryStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_connected_entry_is_not_overwritten_by_running_job() {
    let app = create_test_app();
    let gate = app.runner.hold_connects();
    app.queue
        .add_entry(None, ProfileCandidate::new(JDOE))
        .await
        .unwrap();

    app.scheduler.connect_now().await.unwrap();
    wait_until(|| app.runner.connect_calls() == 1).await;

    app.runner.set_connections(json!({ "identifiers": ["jdoe"] }));
    app.reconciler.reconcile().await.unwrap();
    gate.notify_one();
    wait_until(|| app.scheduler.in_flight_count() == 0).await;

    let entry = app.queue.find_by_url(None, JDOE).await.unwrap().unwrap();
    assert_eq!(entry.status, EntryStatus::Connected);
    assert!(entry.completed_at.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_reconcile_disposes_connections_page() {
    let app = create_test_app();

    app.reconciler.reconcile().await.unwrap();

    assert_eq!(app.runner.disposed_count(), 1);
    assert_eq!(app.runner.routines(), vec![Routine::ExtractConnections]);
    assert_eq!(app.runner.loads().listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reconcile_rejects_malformed_result() {
    let app = create_test_app();
    app.runner.set_connections(json!({ "unexpected": true }));

    assert!(app.reconciler.reconcile().await.is_err());
    assert_eq!(app.store.writes_for(ACCEPTED_CONNECTIONS_KEY), 0);
    assert_eq!(app.runner.disposed_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_periodic_reconcile_runs_on_interval() {
    let app = create_test_app();
    app.queue
        .add_entry(None, ProfileCandidate::new(BLEE))
        .await
        .unwrap();
    app.runner.set_connections(json!({ "identifiers": ["blee"] }));

    app.workers.arm_reconciliation(Duration::from_secs(60));
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(app.runner.opened().is_empty());

    wait_for_status(&app.queue, None, BLEE, EntryStatus::Connected).await;
    app.workers.shutdown();
    assert_eq!(app.workers.reconcile_period(), None);
}

#[tokio::test(start_paused = true)]
async fn test_saving_settings_rearms_reconcile_timer() {
    let app = create_test_app();
    app.workers.start().await.unwrap();
    assert_eq!(app.workers.reconcile_period(), Some(Duration::from_secs(300)));

    let response = app
        .surface
        .dispatch_value(json!({
            "action": "setSettings",
            "settings": { "minDelay": 1, "maxDelay": 2, "checkInterval": 10 }
        }))
        .await;
    assert_eq!(response, json!({ "success": true }));
    assert_eq!(app.workers.reconcile_period(), Some(Duration::from_secs(600)));

    // 旧的5分钟定时器已被替换
    tokio::time::sleep(Duration::from_secs(330)).await;
    assert!(app.runner.opened().is_empty());
    wait_until(|| app.runner.routines().contains(&Routine::ExtractConnections)).await;

    let saved: UserSettings = app.context.settings().await.unwrap();
    assert_eq!(saved.check_interval_minutes, 10.0);
    app.workers.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_rearming_lets_running_check_release_its_page() {
    let app = create_test_app();
    app.runner.stall(&AutomationSettings::default().connections_url);

    app.workers.arm_reconciliation(Duration::from_secs(60));
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(app.runner.opened().len(), 1);
    assert_eq!(app.runner.disposed_count(), 0);

    let response = app
        .surface
        .dispatch_value(json!({
            "action": "setSettings",
            "settings": { "minDelay": 1, "maxDelay": 2, "checkInterval": 10 }
        }))
        .await;
    assert_eq!(response, json!({ "success": true }));

    // 页面加载超时后对账结束并释放页面
    wait_until(|| app.runner.disposed_count() == 1).await;
    assert_eq!(app.runner.opened().len(), 1);
    assert_eq!(app.runner.loads().listener_count(), 0);
    app.workers.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_check_connections_now_reports_count() {
    let app = create_test_app();
    app.runner.set_connections(json!({ "identifiers": ["jdoe", "asmith"] }));

    let response = app
        .surface
        .dispatch_value(json!({ "action": "checkConnectionsNow" }))
        .await;

    assert_eq!(response, json!({ "success": true, "count": 2 }));
    let accepted = app
        .surface
        .dispatch_value(json!({ "action": "getAcceptedConnections" }))
        .await;
    assert_eq!(accepted["connections"], json!(["asmith", "jdoe"]));
    assert!(accepted["lastCheck"].is_string());
    app.workers.shutdown();
}

#[tokio::test]
async fn test_accepted_connections_read_plain_list() {
    let app = create_test_app();
    write_key(app.store.as_ref(), ACCEPTED_CONNECTIONS_KEY, &json!(["jdoe"]))
        .await
        .unwrap();

    let accepted = app
        .surface
        .dispatch_value(json!({ "action": "getAcceptedConnections" }))
        .await;

    assert_eq!(accepted, json!({ "connections": ["jdoe"], "lastCheck": null }));
}
