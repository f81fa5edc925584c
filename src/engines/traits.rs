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

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// 执行器错误类型
#[derive(Error, Debug)]
pub enum RunnerError {
    /// 无法打开或操作浏览上下文
    #[error("Context error: {0}")]
    Context(String),
    /// 脚本注入或执行失败
    #[error("Script error: {0}")]
    Script(String),
    /// 等待页面加载超时
    #[error("Timed out waiting for page load")]
    LoadTimeout,
    /// 上下文不存在或已被释放
    #[error("Unknown context: {0}")]
    UnknownContext(ContextId),
}

/// 浏览上下文标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(Uuid);

impl ContextId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 打开上下文时返回的句柄
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextHandle {
    /// 上下文标识，用于过滤加载完成事件
    pub id: ContextId,
    /// 打开的URL
    pub url: String,
}

/// 上下文可见性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// 后台打开，不抢占焦点
    Background,
    /// 前台打开，供用户继续操作
    Foreground,
}

/// 注入页面执行的例程
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routine {
    /// 发送连接请求
    Connect,
    /// 从连接列表页面提取用户
    ExtractConnections,
    /// 打开消息框并填入内容，由用户手动发送
    ComposeMessage { message: String },
}

impl Routine {
    pub fn name(&self) -> &'static str {
        match self {
            Routine::Connect => "connect",
            Routine::ExtractConnections => "extract_connections",
            Routine::ComposeMessage { .. } => "compose_message",
        }
    }
}

/// 连接例程的执行结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectOutcome {
    /// 是否成功
    #[serde(alias = "success")]
    pub succeeded: bool,
    /// 失败原因
    #[serde(default)]
    pub error: Option<String>,
    /// 附加说明（例如“已发送过邀请”）
    #[serde(default)]
    pub note: Option<String>,
}

impl ConnectOutcome {
    /// 解析例程返回值
    pub fn from_value(value: Value) -> Result<Self, RunnerError> {
        serde_json::from_value(value)
            .map_err(|e| RunnerError::Script(format!("Unexpected routine result: {}", e)))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExtractionResult {
    Wrapped { identifiers: Vec<String> },
    Bare(Vec<String>),
}

/// 解析连接提取例程返回的标识列表
///
/// 接受 `{ identifiers: [..] }` 或直接的数组
pub fn parse_identifiers(value: Value) -> Result<Vec<String>, RunnerError> {
    match serde_json::from_value(value) {
        Ok(ExtractionResult::Wrapped { identifiers }) | Ok(ExtractionResult::Bare(identifiers)) => {
            Ok(identifiers)
        }
        Err(e) => Err(RunnerError::Script(format!(
            "Unexpected extraction result: {}",
            e
        ))),
    }
}

/// 页面动作执行器特质
///
/// 在浏览上下文中打开页面、等待加载完成、注入例程并取回结果
#[async_trait]
pub trait ActionRunner: Send + Sync {
    /// 打开新上下文并开始导航
    ///
    /// 加载完成订阅在导航开始前建立，之后由 `wait_for_load` 消费
    async fn open_context(
        &self,
        url: &str,
        visibility: Visibility,
    ) -> Result<ContextHandle, RunnerError>;

    /// 在后台打开新上下文
    async fn open_background(&self, url: &str) -> Result<ContextHandle, RunnerError> {
        self.open_context(url, Visibility::Background).await
    }

    /// 等待该上下文的加载完成事件，只触发一次
    async fn wait_for_load(&self, handle: &ContextHandle) -> Result<(), RunnerError>;

    /// 在超时时间内等待加载完成，`None` 表示无限等待
    async fn wait_for_load_within(
        &self,
        handle: &ContextHandle,
        timeout: Option<Duration>,
    ) -> Result<(), RunnerError> {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, self.wait_for_load(handle))
                .await
                .map_err(|_| RunnerError::LoadTimeout)?,
            None => self.wait_for_load(handle).await,
        }
    }

    /// 注入例程并返回其结果
    async fn inject_and_run(
        &self,
        handle: &ContextHandle,
        routine: &Routine,
    ) -> Result<Value, RunnerError>;

    /// 释放上下文
    async fn dispose(&self, handle: &ContextHandle) -> Result<(), RunnerError>;

    /// 执行器名称
    fn name(&self) -> &'static str;
}
