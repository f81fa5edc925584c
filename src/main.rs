// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use autoconnect::application::use_cases::compose_message::MessageComposer;
use autoconnect::application::use_cases::control_surface::ControlSurface;
use autoconnect::config::settings::Settings;
use autoconnect::engines::chromium_runner::{ChromiumRunner, RoutineScripts};
use autoconnect::engines::traits::ActionRunner;
use autoconnect::infrastructure::storage::create_storage_repository;
use autoconnect::presentation::routes;
use autoconnect::queue::processing_context::ProcessingContext;
use autoconnect::queue::queue_manager::QueueManager;
use autoconnect::queue::scheduler::JobScheduler;
use autoconnect::workers::job_executor::JobExecutor;
use autoconnect::workers::manager::WorkerManager;
use autoconnect::workers::reconcile_worker::Reconciler;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use autoconnect::utils::telemetry;

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动服务
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting autoconnect...");

    // 2. Load configuration
    let settings = Arc::new(Settings::new()?);
    info!("Configuration loaded");

    if settings.metrics.enabled {
        autoconnect::infrastructure::metrics::init_metrics(&settings.metrics.listen)?;
    }

    // 3. Open the persistent store
    let store = create_storage_repository(&settings.storage).await?;
    info!("Storage backend '{}' ready", settings.storage.storage_type);

    // 4. Launch the browser
    let scripts = RoutineScripts::load(settings.automation.scripts_dir.as_deref()).await?;
    let runner: Arc<dyn ActionRunner> =
        Arc::new(ChromiumRunner::launch(&settings.browser, scripts).await?);
    info!("Browser runner '{}' ready", runner.name());

    // 5. Initialize Components
    let queue = Arc::new(QueueManager::new(store.clone()));
    let context = Arc::new(ProcessingContext::new(store));
    let executor = Arc::new(JobExecutor::new(
        queue.clone(),
        runner.clone(),
        settings.automation.clone(),
    ));
    let scheduler = Arc::new(JobScheduler::new(
        queue.clone(),
        context.clone(),
        executor,
    ));
    let reconciler = Arc::new(Reconciler::new(
        queue.clone(),
        runner.clone(),
        settings.automation.clone(),
    ));
    let composer = Arc::new(MessageComposer::new(
        runner.clone(),
        settings.automation.clone(),
    ));

    // 6. Start Workers
    let worker_manager = Arc::new(WorkerManager::new(
        queue.clone(),
        context.clone(),
        scheduler,
        reconciler,
    ));
    worker_manager.start().await?;

    let surface = Arc::new(ControlSurface::new(
        queue,
        context,
        worker_manager.clone(),
        composer,
    ));

    // 7. Start HTTP server
    let app = routes::app(surface);
    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    let shutdown_manager = worker_manager.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown_manager.wait_for_shutdown().await })
        .await?;

    Ok(())
}
