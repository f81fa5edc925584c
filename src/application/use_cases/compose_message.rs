// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::AutomationSettings;
use crate::engines::traits::{ActionRunner, ConnectOutcome, Routine, RunnerError, Visibility};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("Message must not be empty")]
    EmptyMessage,
    #[error(transparent)]
    Runner(#[from] RunnerError),
    #[error("{0}")]
    Rejected(String),
}

/// 消息编写用例
///
/// 在前台打开对方主页，打开消息框并填入内容，发送由用户确认。
/// 页面保持打开，不修改队列。
pub struct MessageComposer {
    runner: Arc<dyn ActionRunner>,
    automation: AutomationSettings,
}

impl MessageComposer {
    pub fn new(runner: Arc<dyn ActionRunner>, automation: AutomationSettings) -> Self {
        Self { runner, automation }
    }

    pub async fn compose(&self, target_url: &str, message: &str) -> Result<(), ComposeError> {
        if message.trim().is_empty() {
            return Err(ComposeError::EmptyMessage);
        }

        let handle = self
            .runner
            .open_context(target_url, Visibility::Foreground)
            .await?;
        self.runner
            .wait_for_load_within(&handle, self.automation.load_timeout())
            .await?;
        tokio::time::sleep(self.automation.message_settle_delay()).await;

        let routine = Routine::ComposeMessage {
            message: message.to_string(),
        };
        let value = self.runner.inject_and_run(&handle, &routine).await?;
        let outcome = ConnectOutcome::from_value(value)?;
        if !outcome.succeeded {
            return Err(ComposeError::Rejected(
                outcome
                    .error
                    .unwrap_or_else(|| "Unknown error".to_string()),
            ));
        }

        info!("Message drafted for {}", target_url);
        Ok(())
    }
}
