// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.


use autoconnect::application::use_cases::compose_message::MessageComposer;
use autoconnect::application::use_cases::control_surface::ControlSurface;
use autoconnect::config::settings::AutomationSettings;
use autoconnect::domain::models::queue_entry::{EntryStatus, QueueEntry};
use autoconnect::domain::repositories::storage_repository::KeyValueStore;
use autoconnect::engines::traits::ActionRunner;
use autoconnect::queue::processing_context::ProcessingContext;
use autoconnect::queue::queue_manager::QueueManager;
use autoconnect::queue::scheduler::JobScheduler;
use autoconnect::workers::job_executor::JobExecutor;
use autoconnect::workers::manager::WorkerManager;
use autoconnect::workers::reconcile_worker::Reconciler;
use counting_store::CountingStore;
use scripted_runner::ScriptedRunner;
use std::sync::Arc;
use std::time::Duration;

pub const JDOE: &str = "https://www.linkedin.com/in/jdoe";
pub const ASMITH: &str = "https://www.linkedin.com/in/asmith";
pub const BLEE: &str = "https://www.linkedin.com/in/blee";

#[allow(dead_code)]
pub struct TestApp {
    pub store: Arc<CountingStore>,
    pub runner: Arc<ScriptedRunner>,
    pub queue: Arc<QueueManager>,
    pub context: Arc<ProcessingContext>,
    pub scheduler: Arc<JobScheduler>,
    pub reconciler: Arc<Reconciler>,
    pub workers: Arc<WorkerManager>,
    pub surface: Arc<ControlSurface>,
}

pub fn create_test_app() -> TestApp {
    create_test_app_with(AutomationSettings::default())
}

pub fn create_test_app_with(automation: AutomationSettings) -> TestApp {
    let store = Arc::new(CountingStore::new());
    let runner = Arc::new(ScriptedRunner::new());
    let kv: Arc<dyn KeyValueStore> = store.clone();
    let action_runner: Arc<dyn ActionRunner> = runner.clone();

    let queue = Arc::new(QueueManager::new(kv.clone()));
    let context = Arc::new(ProcessingContext::new(kv));
    let executor = Arc::new(JobExecutor::new(
        queue.clone(),
        action_runner.clone(),
        automation.clone(),
    ));
    let scheduler = Arc::new(JobScheduler::new(
        queue.clone(),
        context.clone(),
        executor,
    ));
    let reconciler = Arc::new(Reconciler::new(
        queue.clone(),
        action_runner.clone(),
        automation.clone(),
    ));
    let workers = Arc::new(WorkerManager::new(
        queue.clone(),
        context.clone(),
        scheduler.clone(),
        reconciler.clone(),
    ));
    let composer = Arc::new(MessageComposer::new(action_runner, automation));
    let surface = Arc::new(ControlSurface::new(
        queue.clone(),
        context.clone(),
        workers.clone(),
        composer,
    ));

    TestApp {
        store,
        runner,
        queue,
        context,
        scheduler,
        reconciler,
        workers,
        surface,
    }
}

/// 轮询直到条目进入指定状态，每次等待100毫秒
pub async fn wait_for_status(
    queue: &QueueManager,
    owner: Option<&str>,
    url: &str,
    status: EntryStatus,
) -> QueueEntry {
    for _ in 0..10_000 {
        if let Some(entry) = queue.find_by_url(owner, url).await.unwrap() {
            if entry.status == status {
                return entry;
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("{} never reached status {}", url, status);
}

/// 轮询直到条件成立
pub async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("condition never became true");
}
