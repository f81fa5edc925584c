// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{create_test_app, create_test_app_with, wait_for_status, wait_until};
use super::helpers::{ASMITH, BLEE, JDOE};
use autoconnect::config::settings::AutomationSettings;
use autoconnect::domain::models::queue_entry::{EntryStatus, ProfileCandidate};
use autoconnect::domain::models::user_settings::UserSettings;
use autoconnect::engines::traits::Visibility;
use autoconnect::queue::queue_manager::INTERRUPTED_ERROR;
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;

fn delays(min: f64, max: f64) -> UserSettings {
    UserSettings {
        min_delay_minutes: min,
        max_delay_minutes: max,
        check_interval_minutes: 5.0,
    }
}

#[tokio::test(start_paused = true)]
async fn test_start_with_empty_queue_stops_immediately() {
    let app = create_test_app();

    app.scheduler.start().await.unwrap();

    assert!(!app.context.is_processing().await.unwrap());
    assert!(!app.scheduler.has_armed_timer());
    assert!(app.runner.opened().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_single_entry_completes_and_clears_flag() {
    let app = create_test_app();
    app.queue
        .add_entry(None, ProfileCandidate::new(JDOE).with_name("Jane Doe"))
        .await
        .unwrap();

    app.scheduler.start().await.unwrap();
    let entry = wait_for_status(&app.queue, None, JDOE, EntryStatus::Completed).await;

    assert!(entry.error.is_none());
    assert!(entry.completed_at.is_some());
    wait_until(|| app.scheduler.in_flight_count() == 0).await;
    assert!(!app.context.is_processing().await.unwrap());
    assert!(!app.scheduler.has_armed_timer());

    let opened = app.runner.opened();
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0], (JDOE.to_string(), Visibility::Background));

    // 页面在关闭延迟之后才被释放
    wait_until(|| app.runner.disposed_count() == 1).await;
}

#[tokio::test(start_paused = true)]
async fn test_entries_are_chained_after_random_delay() {
    let app = create_test_app();
    app.context.save_settings(&delays(2.0, 2.0)).await.unwrap();
    app.queue
        .add_entry(None, ProfileCandidate::new(JDOE))
        .await
        .unwrap();
    app.queue
        .add_entry(None, ProfileCandidate::new(ASMITH))
        .await
        .unwrap();

    app.scheduler.start().await.unwrap();
    wait_for_status(&app.queue, None, JDOE, EntryStatus::Completed).await;
    let first_done = Instant::now();
    wait_until(|| app.scheduler.has_armed_timer()).await;

    let second = app.queue.find_by_url(None, ASMITH).await.unwrap().unwrap();
    assert_eq!(second.status, EntryStatus::Pending);

    wait_for_status(&app.queue, None, ASMITH, EntryStatus::Completed).await;
    let gap = first_done.elapsed();
    assert!(gap >= Duration::from_secs(120), "gap was {:?}", gap);
    assert!(gap <= Duration::from_secs(130), "gap was {:?}", gap);

    let opened: Vec<String> = app.runner.opened().into_iter().map(|(url, _)| url).collect();
    assert_eq!(opened, vec![JDOE.to_string(), ASMITH.to_string()]);
    wait_until(|| app.scheduler.in_flight_count() == 0).await;
    assert!(!app.context.is_processing().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_pause_lets_current_job_finish_without_chaining() {
    let app = create_test_app();
    let gate = app.runner.hold_connects();
    app.queue
        .add_entry(None, ProfileCandidate::new(JDOE))
        .await
        .unwrap();
    app.queue
        .add_entry(None, ProfileCandidate::new(ASMITH))
        .await
        .unwrap();

    app.scheduler.start().await.unwrap();
    wait_until(|| app.runner.connect_calls() == 1).await;
    app.scheduler.pause().await.unwrap();
    gate.notify_one();

    wait_for_status(&app.queue, None, JDOE, EntryStatus::Completed).await;
    tokio::time::sleep(Duration::from_secs(600)).await;

    let second = app.queue.find_by_url(None, ASMITH).await.unwrap().unwrap();
    assert_eq!(second.status, EntryStatus::Pending);
    assert_eq!(app.runner.connect_calls(), 1);
    assert!(!app.scheduler.has_armed_timer());
    assert!(!app.context.is_processing().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_start_while_job_in_flight_is_noop() {
    let app = create_test_app();
    let gate = app.runner.hold_connects();
    app.queue
        .add_entry(None, ProfileCandidate::new(JDOE))
        .await
        .unwrap();
    app.queue
        .add_entry(None, ProfileCandidate::new(ASMITH))
        .await
        .unwrap();

    app.scheduler.start().await.unwrap();
    wait_until(|| app.runner.connect_calls() == 1).await;
    app.scheduler.start().await.unwrap();
    app.scheduler.connect_now().await.unwrap();

    // connect_now 派发第二个条目，但不会再次派发正在执行的条目
    wait_until(|| app.runner.connect_calls() == 2).await;
    assert_eq!(app.runner.opened().len(), 2);
    gate.notify_one();
    gate.notify_one();
    wait_for_status(&app.queue, None, JDOE, EntryStatus::Completed).await;
    wait_for_status(&app.queue, None, ASMITH, EntryStatus::Completed).await;
}

#[tokio::test(start_paused = true)]
async fn test_connect_now_without_pending_items_fails() {
    let app = create_test_app();

    let error = app.scheduler.connect_now().await.unwrap_err();
    assert_eq!(error.to_string(), "No pending items");
}

#[tokio::test(start_paused = true)]
async fn test_connect_now_keeps_processing_flag() {
    let app = create_test_app();
    app.queue
        .add_entry(None, ProfileCandidate::new(JDOE))
        .await
        .unwrap();
    app.queue
        .add_entry(None, ProfileCandidate::new(ASMITH))
        .await
        .unwrap();

    app.scheduler.connect_now().await.unwrap();
    wait_for_status(&app.queue, None, JDOE, EntryStatus::Completed).await;
    wait_until(|| app.scheduler.in_flight_count() == 0).await;

    assert!(!app.context.is_processing().await.unwrap());
    assert!(!app.scheduler.has_armed_timer());
    let second = app.queue.find_by_url(None, ASMITH).await.unwrap().unwrap();
    assert_eq!(second.status, EntryStatus::Pending);
}

#[tokio::test(start_paused = true)]
async fn test_invitation_limit_is_recorded_without_pausing() {
    let app = create_test_app();
    app.runner.push_outcome(json!({
        "success": false,
        "error": "You've reached the weekly invitation limit"
    }));
    app.queue
        .add_entry(None, ProfileCandidate::new(JDOE))
        .await
        .unwrap();
    app.queue
        .add_entry(None, ProfileCandidate::new(ASMITH))
        .await
        .unwrap();

    app.scheduler.start().await.unwrap();
    let failed = wait_for_status(&app.queue, None, JDOE, EntryStatus::Failed).await;

    assert_eq!(
        failed.error.as_deref(),
        Some("You've reached the weekly invitation limit")
    );
    wait_until(|| app.scheduler.has_armed_timer()).await;
    assert!(app.context.is_processing().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_page_that_never_loads_times_out() {
    let app = create_test_app_with(AutomationSettings {
        load_timeout_secs: 30,
        ..AutomationSettings::default()
    });
    app.runner.stall(JDOE);
    app.queue
        .add_entry(None, ProfileCandidate::new(JDOE))
        .await
        .unwrap();

    app.scheduler.start().await.unwrap();
    let failed = wait_for_status(&app.queue, None, JDOE, EntryStatus::Failed).await;

    assert_eq!(failed.error.as_deref(), Some("Timed out waiting for page load"));
    assert_eq!(app.runner.connect_calls(), 0);
    wait_until(|| app.runner.loads().listener_count() == 0).await;
}

#[tokio::test(start_paused = true)]
async fn test_unrelated_load_events_are_ignored() {
    let app = create_test_app();
    app.queue
        .add_entry(None, ProfileCandidate::new(JDOE))
        .await
        .unwrap();
    app.queue
        .add_entry(None, ProfileCandidate::new(BLEE))
        .await
        .unwrap();

    app.scheduler.connect_now().await.unwrap();
    wait_for_status(&app.queue, None, JDOE, EntryStatus::Completed).await;

    let other = app.queue.find_by_url(None, BLEE).await.unwrap().unwrap();
    assert_eq!(other.status, EntryStatus::Pending);
    assert_eq!(app.runner.connect_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_removed_entry_is_not_recreated() {
    let app = create_test_app();
    let gate = app.runner.hold_connects();
    let id = app
        .queue
        .add_entry(None, ProfileCandidate::new(JDOE))
        .await
        .unwrap();

    app.scheduler.connect_now().await.unwrap();
    wait_until(|| app.runner.connect_calls() == 1).await;
    app.queue.remove_entry(None, &id).await.unwrap();
    gate.notify_one();

    wait_until(|| app.scheduler.in_flight_count() == 0).await;
    assert!(app.queue.list_entries(None).await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_restart_fails_interrupted_entries_and_resumes() {
    let app = create_test_app();
    let id = app
        .queue
        .add_entry(None, ProfileCandidate::new(JDOE))
        .await
        .unwrap();
    app.queue
        .add_entry(None, ProfileCandidate::new(ASMITH))
        .await
        .unwrap();
    app.queue
        .update_entry(None, &id, |entry| entry.mark_processing())
        .await
        .unwrap();
    app.context.set_processing(true).await.unwrap();

    app.workers.start().await.unwrap();

    let interrupted = app.queue.find_by_url(None, JDOE).await.unwrap().unwrap();
    assert_eq!(interrupted.status, EntryStatus::Failed);
    assert_eq!(interrupted.error.as_deref(), Some(INTERRUPTED_ERROR));
    assert!(app.scheduler.has_armed_timer());
    assert_eq!(app.workers.reconcile_period(), Some(Duration::from_secs(300)));

    wait_for_status(&app.queue, None, ASMITH, EntryStatus::Completed).await;
    app.workers.shutdown();
}
