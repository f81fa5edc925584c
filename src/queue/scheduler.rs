// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::queue_entry::{EntryStatus, QueueEntry};
use crate::domain::models::user_settings::{minutes_to_duration, UserSettings};
use crate::domain::repositories::storage_repository::StorageError;
use crate::queue::processing_context::ProcessingContext;
use crate::queue::queue_manager::{QueueError, QueueManager};
use crate::workers::job_executor::JobExecutor;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// 调度器错误类型
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// 没有待处理条目
    #[error("No pending items")]
    NoPending,

    /// 队列错误
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// 存储错误
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// 设置算出的间隔无法作为定时器时长
    #[error("Invalid delay of {0} minutes")]
    InvalidDelay(f64),
}

/// 计算两次作业之间的间隔（分钟）
///
/// `r` 为 `[0, 1)` 内的随机数，结果落在 `[min, max]` 内；`min == max` 时恰好为 `min`
pub fn compute_delay_minutes(settings: &UserSettings, r: f64) -> f64 {
    let min = settings.min_delay_minutes;
    let max = settings.max_delay_minutes;
    min + r * (max - min)
}

/// 作业调度器
///
/// 一次只处理一个条目，作业结束后按随机间隔挂起一个单次定时器再处理下一个。
/// 作业在独立任务中运行，取消定时器不会中断正在执行的作业。
pub struct JobScheduler {
    queue: Arc<QueueManager>,
    context: Arc<ProcessingContext>,
    executor: Arc<JobExecutor>,
    timer: Mutex<Option<JoinHandle<()>>>,
    in_flight: Mutex<HashSet<String>>,
}

impl JobScheduler {
    pub fn new(
        queue: Arc<QueueManager>,
        context: Arc<ProcessingContext>,
        executor: Arc<JobExecutor>,
    ) -> Self {
        Self {
            queue,
            context,
            executor,
            timer: Mutex::new(None),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// 开始处理队列
    ///
    /// 没有作业在执行且没有挂起的定时器时立即处理下一个条目；
    /// 队列为空时立刻清除处理标志
    pub async fn start(self: &Arc<Self>) -> Result<(), SchedulerError> {
        self.context.set_processing(true).await?;
        if self.in_flight_count() > 0 || self.has_armed_timer() {
            debug!("Scheduler already active, start is a no-op");
            return Ok(());
        }
        if !self.process_next().await? {
            info!("Queue has no pending items, processing stopped");
        }
        Ok(())
    }

    /// 暂停处理
    ///
    /// 取消挂起的定时器；正在执行的作业会完成，但不会再衔接下一个
    pub async fn pause(&self) -> Result<(), SchedulerError> {
        self.context.set_processing(false).await?;
        self.cancel_timer();
        info!("Processing paused");
        Ok(())
    }

    /// 立即处理下一个条目，不改变处理标志
    pub async fn connect_now(self: &Arc<Self>) -> Result<(), SchedulerError> {
        let owner = self.context.owner();
        let entry = self
            .next_unclaimed(owner.as_deref())
            .await?
            .ok_or(SchedulerError::NoPending)?;
        self.cancel_timer();
        self.dispatch(owner, entry);
        Ok(())
    }

    /// 进程重启后恢复调度
    ///
    /// 持久化的处理标志为真时按随机间隔挂起定时器
    pub async fn resume(self: &Arc<Self>) -> Result<(), SchedulerError> {
        if self.context.is_processing().await? {
            info!("Resuming queue processing after restart");
            self.schedule_next().await?;
        }
        Ok(())
    }

    /// 进程关闭时取消定时器，保留持久化的处理标志以便重启后恢复
    pub fn halt(&self) {
        self.cancel_timer();
    }

    /// 是否有挂起的定时器
    pub fn has_armed_timer(&self) -> bool {
        self.timer
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// 正在执行的作业数量
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// 取出下一个待处理条目并派发
    ///
    /// # 返回值
    ///
    /// 队列为空时清除处理标志并返回 `false`
    async fn process_next(self: &Arc<Self>) -> Result<bool, SchedulerError> {
        let owner = self.context.owner();
        match self.next_unclaimed(owner.as_deref()).await? {
            Some(entry) => {
                self.dispatch(owner, entry);
                Ok(true)
            }
            None => {
                self.context.set_processing(false).await?;
                Ok(false)
            }
        }
    }

    async fn next_unclaimed(
        &self,
        owner: Option<&str>,
    ) -> Result<Option<QueueEntry>, SchedulerError> {
        let entries = self.queue.list_entries(owner).await?;
        let in_flight = self.in_flight.lock();
        Ok(entries.into_iter().find(|entry| {
            entry.status == EntryStatus::Pending && !in_flight.contains(&entry.id)
        }))
    }

    /// 在独立任务中执行作业，结束后衔接下一次调度
    fn dispatch(self: &Arc<Self>, owner: Option<String>, entry: QueueEntry) {
        self.in_flight.lock().insert(entry.id.clone());
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let id = entry.id.clone();
            scheduler.executor.run_job(owner.as_deref(), entry).await;
            scheduler.in_flight.lock().remove(&id);
            if let Err(e) = scheduler.schedule_next().await {
                error!("Failed to schedule next job: {}", e);
            }
        });
    }

    /// 作业结束后的衔接
    ///
    /// 处理标志为真且仍有待处理条目时挂起随机间隔的定时器，否则清除标志
    async fn schedule_next(self: &Arc<Self>) -> Result<(), SchedulerError> {
        if !self.context.is_processing().await? {
            return Ok(());
        }
        let owner = self.context.owner();
        if self.queue.pending_count(owner.as_deref()).await? == 0 {
            info!("All queue entries processed");
            self.context.set_processing(false).await?;
            return Ok(());
        }

        let settings = self.context.settings().await?;
        let minutes = compute_delay_minutes(&settings, rand::rng().random::<f64>());
        let Some(delay) = minutes_to_duration(minutes) else {
            self.context.set_processing(false).await?;
            return Err(SchedulerError::InvalidDelay(minutes));
        };
        info!("Next connection request in {:.1} minutes", minutes);
        self.arm_timer(delay);
        Ok(())
    }

    fn arm_timer(self: &Arc<Self>, delay: Duration) {
        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            scheduler.release_timer(tokio::task::id());
            match scheduler.context.is_processing().await {
                Ok(true) => {
                    if let Err(e) = scheduler.process_next().await {
                        error!("Scheduled job dispatch failed: {}", e);
                    }
                }
                Ok(false) => {}
                Err(e) => error!("Failed to read processing flag: {}", e),
            }
        });
        if let Some(previous) = self.timer.lock().replace(handle) {
            previous.abort();
        }
    }

    /// 定时器触发后只清除自己的句柄，槽位已被新定时器占用时保持不变
    fn release_timer(&self, fired: tokio::task::Id) {
        let mut slot = self.timer.lock();
        if slot.as_ref().is_some_and(|handle| handle.id() == fired) {
            slot.take();
        }
    }

    fn cancel_timer(&self) {
        if let Some(handle) = self.timer.lock().take() {
            handle.abort();
            debug!("Cancelled scheduled job timer");
        }
    }
}
