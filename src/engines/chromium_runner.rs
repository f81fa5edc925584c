// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::BrowserSettings;
use crate::engines::load_events::{LoadEventHub, LoadState};
use crate::engines::traits::{
    ActionRunner, ContextHandle, ContextId, Routine, RunnerError, Visibility,
};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use dashmap::DashMap;
use futures::StreamExt;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const CONNECT_SCRIPT: &str = include_str!("../../scripts/connect.js");
const EXTRACT_CONNECTIONS_SCRIPT: &str = include_str!("../../scripts/extract_connections.js");
const COMPOSE_MESSAGE_SCRIPT: &str = include_str!("../../scripts/compose_message.js");

/// 例程脚本集合
///
/// 每个脚本是一个（可为 async 的）函数表达式，注入时以 `(script)(args)` 形式调用
#[derive(Debug, Clone)]
pub struct RoutineScripts {
    connect: String,
    extract_connections: String,
    compose_message: String,
}

impl Default for RoutineScripts {
    fn default() -> Self {
        Self {
            connect: CONNECT_SCRIPT.to_string(),
            extract_connections: EXTRACT_CONNECTIONS_SCRIPT.to_string(),
            compose_message: COMPOSE_MESSAGE_SCRIPT.to_string(),
        }
    }
}

impl RoutineScripts {
    /// 从目录加载脚本，缺失的文件使用内置版本
    pub async fn load(dir: Option<&str>) -> Result<Self, RunnerError> {
        let mut scripts = Self::default();
        let Some(dir) = dir else {
            return Ok(scripts);
        };
        let dir = Path::new(dir);
        for (file, slot) in [
            ("connect.js", &mut scripts.connect),
            ("extract_connections.js", &mut scripts.extract_connections),
            ("compose_message.js", &mut scripts.compose_message),
        ] {
            let path = dir.join(file);
            match tokio::fs::read_to_string(&path).await {
                Ok(source) => {
                    info!("Loaded routine script from {}", path.display());
                    *slot = source;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(RunnerError::Script(format!(
                        "Failed to read {}: {}",
                        path.display(),
                        e
                    )))
                }
            }
        }
        Ok(scripts)
    }

    /// 生成注入表达式
    pub fn expression(&self, routine: &Routine) -> Result<String, RunnerError> {
        let expression = match routine {
            Routine::Connect => format!("({})()", self.connect.trim()),
            Routine::ExtractConnections => format!("({})()", self.extract_connections.trim()),
            Routine::ComposeMessage { message } => {
                let argument = serde_json::to_string(message)
                    .map_err(|e| RunnerError::Script(e.to_string()))?;
                format!("({})({})", self.compose_message.trim(), argument)
            }
        };
        Ok(expression)
    }
}

/// 基于chromiumoxide的页面动作执行器
///
/// 每个上下文对应浏览器中的一个标签页，导航在独立任务中进行，
/// 完成后通过 `LoadEventHub` 发布加载事件
pub struct ChromiumRunner {
    browser: Browser,
    handler_task: JoinHandle<()>,
    pages: DashMap<ContextId, Page>,
    loads: Arc<LoadEventHub>,
    scripts: RoutineScripts,
}

impl ChromiumRunner {
    /// 启动或连接浏览器
    ///
    /// 配置了 `remote_debugging_url` 时连接已有实例，否则启动新的Chrome
    pub async fn launch(
        settings: &BrowserSettings,
        scripts: RoutineScripts,
    ) -> Result<Self, RunnerError> {
        let (browser, mut handler) = if let Some(url) = &settings.remote_debugging_url {
            info!("Connecting to remote Chrome instance at: {}", url);
            Browser::connect(url).await.map_err(|e| {
                RunnerError::Context(format!("Failed to connect to remote Chrome: {}", e))
            })?
        } else {
            let mut builder = BrowserConfig::builder()
                .request_timeout(Duration::from_secs(settings.request_timeout_secs))
                .arg("--disable-dev-shm-usage");
            if !settings.headless {
                builder = builder.with_head();
            }
            if let Some(dir) = &settings.user_data_dir {
                builder = builder.user_data_dir(dir);
            }
            let config = builder.build().map_err(RunnerError::Context)?;
            Browser::launch(config)
                .await
                .map_err(|e| RunnerError::Context(format!("Failed to launch Chrome: {}", e)))?
        };

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser,
            handler_task,
            pages: DashMap::new(),
            loads: Arc::new(LoadEventHub::new()),
            scripts,
        })
    }

    fn page(&self, id: &ContextId) -> Result<Page, RunnerError> {
        self.pages
            .get(id)
            .map(|page| page.clone())
            .ok_or(RunnerError::UnknownContext(*id))
    }
}

#[async_trait]
impl ActionRunner for ChromiumRunner {
    async fn open_context(
        &self,
        url: &str,
        visibility: Visibility,
    ) -> Result<ContextHandle, RunnerError> {
        let id = ContextId::new();
        let params = CreateTargetParams::builder()
            .url("about:blank")
            .background(visibility == Visibility::Background)
            .build()
            .map_err(RunnerError::Context)?;
        let page = self
            .browser
            .new_page(params)
            .await
            .map_err(|e| RunnerError::Context(format!("Failed to open page: {}", e)))?;
        self.pages.insert(id, page.clone());

        // 订阅必须在导航开始前登记
        self.loads.register(id);
        let loads = Arc::clone(&self.loads);
        let target = url.to_string();
        tokio::spawn(async move {
            match page.goto(&target).await {
                Ok(_) => loads.publish(id, LoadState::Complete),
                Err(e) => loads.publish(id, LoadState::Failed(e.to_string())),
            }
        });

        debug!("Opened context {} for {}", id, url);
        Ok(ContextHandle {
            id,
            url: url.to_string(),
        })
    }

    async fn wait_for_load(&self, handle: &ContextHandle) -> Result<(), RunnerError> {
        self.loads.wait(handle.id).await
    }

    async fn inject_and_run(
        &self,
        handle: &ContextHandle,
        routine: &Routine,
    ) -> Result<Value, RunnerError> {
        let page = self.page(&handle.id)?;
        let params = EvaluateParams::builder()
            .expression(self.scripts.expression(routine)?)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(RunnerError::Script)?;
        let result = page.evaluate_expression(params).await.map_err(|e| {
            RunnerError::Script(format!("Routine {} failed: {}", routine.name(), e))
        })?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn dispose(&self, handle: &ContextHandle) -> Result<(), RunnerError> {
        self.loads.take(&handle.id);
        let Some((_, page)) = self.pages.remove(&handle.id) else {
            return Ok(());
        };
        page.close()
            .await
            .map_err(|e| RunnerError::Context(format!("Failed to close page: {}", e)))?;
        debug!("Disposed context {}", handle.id);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "chromium"
    }
}

impl Drop for ChromiumRunner {
    fn drop(&mut self) {
        if !self.pages.is_empty() {
            warn!("Dropping browser runner with {} open pages", self.pages.len());
        }
        self.handler_task.abort();
    }
}
