// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::AutomationSettings;
use crate::domain::models::queue_entry::{EntryStatus, QueueEntry};
use crate::engines::traits::{ActionRunner, ConnectOutcome, ContextHandle, Routine, RunnerError};
use crate::queue::queue_manager::QueueManager;
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, warn};

/// 页面例程报告的动作失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionFailure {
    /// 触发了每周邀请上限
    #[error("{0}")]
    RateLimited(String),
    /// 其他被拒绝的情况（按钮缺失、已连接等）
    #[error("{0}")]
    Rejected(String),
}

impl ActionFailure {
    /// 根据例程返回的消息分类
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.to_lowercase().contains("invitation limit") {
            ActionFailure::RateLimited(message)
        } else {
            ActionFailure::Rejected(message)
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ActionFailure::RateLimited(_))
    }
}

/// 单个作业的错误
#[derive(Error, Debug)]
pub enum JobError {
    /// 上下文类错误（打开、加载、注入）
    #[error(transparent)]
    Context(#[from] RunnerError),
    /// 例程报告的失败
    #[error(transparent)]
    Action(#[from] ActionFailure),
}

/// 作业结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// 连接请求已发送
    Completed { note: Option<String> },
    /// 处理失败
    Failed { error: String },
    /// 条目已被删除或已连接，未写入结果
    Skipped,
}

impl JobOutcome {
    fn label(&self) -> &'static str {
        match self {
            JobOutcome::Completed { .. } => "completed",
            JobOutcome::Failed { .. } => "failed",
            JobOutcome::Skipped => "skipped",
        }
    }
}

/// 作业执行器
///
/// 将一个队列条目完整地交给页面动作执行器处理，并把结果写回队列。
/// 所有错误都转换为 `failed` 条目，不会向调度循环传播。
pub struct JobExecutor {
    queue: Arc<QueueManager>,
    runner: Arc<dyn ActionRunner>,
    automation: AutomationSettings,
}

impl JobExecutor {
    pub fn new(
        queue: Arc<QueueManager>,
        runner: Arc<dyn ActionRunner>,
        automation: AutomationSettings,
    ) -> Self {
        Self {
            queue,
            runner,
            automation,
        }
    }

    /// 处理一个条目
    pub async fn run_job(&self, owner: Option<&str>, entry: QueueEntry) -> JobOutcome {
        let started = Instant::now();
        info!("Processing {} ({})", entry.display_name, entry.target_url);

        let claimed = self
            .queue
            .update_entry(owner, &entry.id, |current| {
                if current.status != EntryStatus::Connected {
                    current.mark_processing();
                }
            })
            .await;
        match claimed {
            Ok(Some(current)) if current.status == EntryStatus::Processing => {}
            Ok(_) => {
                info!("Entry {} was removed or connected before processing", entry.id);
                return self.finish(JobOutcome::Skipped, started);
            }
            Err(e) => {
                error!("Failed to mark entry {} as processing: {}", entry.id, e);
                return self.finish(
                    JobOutcome::Failed {
                        error: e.to_string(),
                    },
                    started,
                );
            }
        }

        let outcome = match self.perform(&entry.target_url).await {
            Ok(note) => JobOutcome::Completed { note },
            Err(JobError::Action(failure)) => {
                if failure.is_rate_limited() {
                    warn!("Invitation limit reached while processing {}", entry.target_url);
                }
                JobOutcome::Failed {
                    error: failure.to_string(),
                }
            }
            Err(e) => JobOutcome::Failed {
                error: e.to_string(),
            },
        };

        let outcome = self.record(owner, &entry.id, outcome).await;
        self.finish(outcome, started)
    }

    async fn perform(&self, url: &str) -> Result<Option<String>, JobError> {
        let handle = self.runner.open_background(url).await?;
        let result = self.drive(&handle).await;
        self.dispose_later(handle);
        result
    }

    async fn drive(&self, handle: &ContextHandle) -> Result<Option<String>, JobError> {
        self.runner
            .wait_for_load_within(handle, self.automation.load_timeout())
            .await?;
        tokio::time::sleep(self.automation.settle_delay()).await;

        let value = self.runner.inject_and_run(handle, &Routine::Connect).await?;
        let outcome = ConnectOutcome::from_value(value)?;
        if outcome.succeeded {
            Ok(outcome.note)
        } else {
            Err(ActionFailure::classify(
                outcome
                    .error
                    .unwrap_or_else(|| "Unknown error".to_string()),
            )
            .into())
        }
    }

    /// 写回结果；条目已连接或已删除时不覆盖
    async fn record(&self, owner: Option<&str>, id: &str, outcome: JobOutcome) -> JobOutcome {
        let mut written = false;
        let result = self
            .queue
            .update_entry(owner, id, |current| {
                if current.status == EntryStatus::Connected {
                    return;
                }
                match &outcome {
                    JobOutcome::Completed { .. } => current.mark_completed(),
                    JobOutcome::Failed { error } => current.mark_failed(error.clone()),
                    JobOutcome::Skipped => return,
                }
                written = true;
            })
            .await;

        match result {
            Ok(Some(_)) if written => outcome,
            Ok(_) => {
                info!("Entry {} changed during processing, result discarded", id);
                JobOutcome::Skipped
            }
            Err(e) => {
                error!("Failed to record result for entry {}: {}", id, e);
                outcome
            }
        }
    }

    fn dispose_later(&self, handle: ContextHandle) {
        let runner = Arc::clone(&self.runner);
        let delay = self.automation.dispose_delay();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = runner.dispose(&handle).await {
                warn!("Failed to dispose context {}: {}", handle.id, e);
            }
        });
    }

    fn finish(&self, outcome: JobOutcome, started: Instant) -> JobOutcome {
        counter!("autoconnect_jobs_total", "outcome" => outcome.label()).increment(1);
        histogram!("autoconnect_job_duration_seconds").record(started.elapsed().as_secs_f64());
        match &outcome {
            JobOutcome::Completed { note } => info!("Connection request sent (note: {:?})", note),
            JobOutcome::Failed { error } => warn!("Connection request failed: {}", error),
            JobOutcome::Skipped => {}
        }
        outcome
    }
}
