// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::queue::processing_context::ProcessingContext;
use crate::queue::queue_manager::QueueManager;
use crate::queue::scheduler::{JobScheduler, SchedulerError};
use crate::workers::reconcile_worker::{ReconcileError, ReconcileReport, ReconcileWorker, Reconciler};
use crate::workers::worker::Worker;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

struct ArmedWorker {
    period: Duration,
    handle: JoinHandle<()>,
}

/// 工作管理器
///
/// 持有作业调度器和对账器，负责启动恢复、对账定时器的挂起与替换以及关闭
pub struct WorkerManager {
    queue: Arc<QueueManager>,
    context: Arc<ProcessingContext>,
    scheduler: Arc<JobScheduler>,
    reconciler: Arc<Reconciler>,
    reconcile_worker: Mutex<Option<ArmedWorker>>,
}

impl WorkerManager {
    pub fn new(
        queue: Arc<QueueManager>,
        context: Arc<ProcessingContext>,
        scheduler: Arc<JobScheduler>,
        reconciler: Arc<Reconciler>,
    ) -> Self {
        Self {
            queue,
            context,
            scheduler,
            reconciler,
            reconcile_worker: Mutex::new(None),
        }
    }

    pub fn scheduler(&self) -> &Arc<JobScheduler> {
        &self.scheduler
    }

    /// 启动后台工作
    ///
    /// 将崩溃遗留的 `processing` 条目标记为失败，按持久化标志恢复调度，
    /// 并按用户设置挂起对账定时器
    pub async fn start(&self) -> Result<(), SchedulerError> {
        let recovered = self.queue.fail_interrupted().await?;
        if recovered > 0 {
            warn!("Marked {} interrupted entries as failed", recovered);
        }
        self.scheduler.resume().await?;

        let settings = self.context.settings().await?;
        self.arm_reconciliation(settings.check_interval());
        Ok(())
    }

    /// 挂起周期性对账，替换已有的定时器
    pub fn arm_reconciliation(&self, period: Duration) {
        let worker = ReconcileWorker::new(Arc::clone(&self.reconciler), period);
        let handle = tokio::spawn(async move {
            if let Err(e) = worker.run().await {
                error!("Worker {} stopped: {}", worker.name(), e);
            }
        });

        let previous = self
            .reconcile_worker
            .lock()
            .replace(ArmedWorker { period, handle });
        if let Some(previous) = previous {
            previous.handle.abort();
        }
        info!("Connection check scheduled every {:.1} minutes", period.as_secs_f64() / 60.0);
    }

    /// 根据当前设置重新挂起对账定时器
    pub async fn rearm_reconciliation(&self) {
        match self.context.settings().await {
            Ok(settings) => self.arm_reconciliation(settings.check_interval()),
            Err(e) => error!("Failed to read settings for connection check: {}", e),
        }
    }

    /// 当前对账周期，未挂起时为 `None`
    pub fn reconcile_period(&self) -> Option<Duration> {
        self.reconcile_worker
            .lock()
            .as_ref()
            .filter(|armed| !armed.handle.is_finished())
            .map(|armed| armed.period)
    }

    /// 立即执行一次对账，结束后重新挂起周期定时器
    pub async fn reconcile_now(&self) -> Result<ReconcileReport, ReconcileError> {
        let result = self.reconciler.reconcile().await;
        self.rearm_reconciliation().await;
        result
    }

    /// 停止所有定时器，正在执行的作业不受影响
    pub fn shutdown(&self) {
        if let Some(armed) = self.reconcile_worker.lock().take() {
            armed.handle.abort();
        }
        self.scheduler.halt();
        info!("Workers shut down successfully");
    }

    /// 等待关闭信号并关闭工作器
    pub async fn wait_for_shutdown(&self) {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }
        self.shutdown();
    }
}
