// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::AutomationSettings;
use crate::domain::models::accepted_connections::AcceptedConnections;
use crate::domain::repositories::storage_repository::{
    StorageError, ACCEPTED_CONNECTIONS_KEY, LAST_CONNECTION_CHECK_KEY,
};
use crate::engines::traits::{parse_identifiers, ActionRunner, ContextHandle, Routine, RunnerError};
use crate::queue::queue_manager::{QueueError, QueueManager};
use crate::utils::errors::WorkerError;
use crate::utils::url_utils::normalize_identifier;
use crate::workers::worker::Worker;
use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

/// 对账错误类型
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// 页面动作错误
    #[error(transparent)]
    Runner(#[from] RunnerError),
    /// 队列错误
    #[error(transparent)]
    Queue(#[from] QueueError),
    /// 存储错误
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<serde_json::Error> for ReconcileError {
    fn from(err: serde_json::Error) -> Self {
        ReconcileError::Storage(StorageError::Serialization(err))
    }
}

/// 一次对账的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// 归一化后的已接受用户名
    pub identifiers: Vec<String>,
    /// 本次新标记为 `connected` 的条目数
    pub updated: usize,
}

/// 连接状态对账器
///
/// 抓取连接列表页面，将已接受邀请的条目标记为 `connected`
pub struct Reconciler {
    queue: Arc<QueueManager>,
    runner: Arc<dyn ActionRunner>,
    automation: AutomationSettings,
    run_lock: Mutex<()>,
}

impl Reconciler {
    pub fn new(
        queue: Arc<QueueManager>,
        runner: Arc<dyn ActionRunner>,
        automation: AutomationSettings,
    ) -> Self {
        Self {
            queue,
            runner,
            automation,
            run_lock: Mutex::new(()),
        }
    }

    /// 执行一次对账
    ///
    /// 同一时刻只运行一次；连接列表整体替换，队列只在有变化时写入
    pub async fn reconcile(&self) -> Result<ReconcileReport, ReconcileError> {
        let _guard = self.run_lock.lock().await;
        info!("Checking accepted connections");

        let result = self.run().await;
        let outcome = if result.is_ok() { "success" } else { "error" };
        counter!("autoconnect_reconcile_runs_total", "outcome" => outcome).increment(1);
        result
    }

    async fn run(&self) -> Result<ReconcileReport, ReconcileError> {
        let handle = self
            .runner
            .open_background(&self.automation.connections_url)
            .await?;
        let scraped = self.scrape(&handle).await;
        if let Err(e) = self.runner.dispose(&handle).await {
            warn!("Failed to dispose connections context {}: {}", handle.id, e);
        }
        let raw = scraped?;

        let identifiers: Vec<String> = raw
            .iter()
            .filter_map(|identifier| normalize_identifier(identifier))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        info!("Found {} accepted connections", identifiers.len());

        let checked_at = Utc::now();
        let accepted = AcceptedConnections::new(identifiers.clone());
        let mut payload = HashMap::new();
        payload.insert(
            ACCEPTED_CONNECTIONS_KEY.to_string(),
            serde_json::to_value(&accepted)?,
        );
        payload.insert(
            LAST_CONNECTION_CHECK_KEY.to_string(),
            serde_json::to_value(checked_at)?,
        );
        self.queue.store().set(payload).await?;

        let usernames: HashSet<String> = identifiers.iter().cloned().collect();
        let updated = self.queue.mark_connected(&usernames).await?;
        if updated > 0 {
            counter!("autoconnect_entries_connected_total").increment(updated as u64);
        }

        Ok(ReconcileReport {
            identifiers,
            updated,
        })
    }

    async fn scrape(&self, handle: &ContextHandle) -> Result<Vec<String>, RunnerError> {
        self.runner
            .wait_for_load_within(handle, self.automation.load_timeout())
            .await?;
        tokio::time::sleep(self.automation.settle_delay()).await;
        let value = self
            .runner
            .inject_and_run(handle, &Routine::ExtractConnections)
            .await?;
        parse_identifiers(value)
    }
}

/// 周期性对账工作器
pub struct ReconcileWorker {
    reconciler: Arc<Reconciler>,
    period: Duration,
}

impl ReconcileWorker {
    pub fn new(reconciler: Arc<Reconciler>, period: Duration) -> Self {
        Self { reconciler, period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

#[async_trait]
impl Worker for ReconcileWorker {
    /// 每个周期执行一次对账，首次执行在一个周期之后
    async fn run(&self) -> Result<(), WorkerError> {
        info!(
            "Reconcile worker started, period {} s",
            self.period.as_secs_f64()
        );
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            // 对账在独立任务中运行，定时器被替换时进行中的对账照常完成并释放页面
            let reconciler = Arc::clone(&self.reconciler);
            let pass = tokio::spawn(async move { reconciler.reconcile().await });
            match pass.await {
                Ok(Ok(report)) => {
                    if report.updated > 0 {
                        info!("Marked {} entries as connected", report.updated);
                    }
                }
                Ok(Err(e)) => {
                    error!("Connection check failed: {}", e);
                }
                Err(e) => {
                    error!("Connection check task aborted: {}", e);
                }
            }
        }
    }

    fn name(&self) -> &str {
        "reconcile"
    }
}
