// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::engines::traits::{ContextId, RunnerError};
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, warn};

const CHANNEL_CAPACITY: usize = 64;

/// 页面加载状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// 加载完成
    Complete,
    /// 导航失败
    Failed(String),
}

/// 页面加载事件
#[derive(Debug, Clone)]
pub struct LoadEvent {
    pub context_id: ContextId,
    pub state: LoadState,
}

/// 加载事件中心
///
/// 广播所有上下文的加载事件。等待方在导航开始前通过 `register` 建立订阅，
/// 订阅在消费或丢弃时自动注销。
pub struct LoadEventHub {
    sender: broadcast::Sender<LoadEvent>,
    pending: DashMap<ContextId, LoadSubscription>,
}

impl LoadEventHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            pending: DashMap::new(),
        }
    }

    /// 发布加载事件，没有订阅者时丢弃
    pub fn publish(&self, context_id: ContextId, state: LoadState) {
        debug!("Load event for context {}: {:?}", context_id, state);
        let _ = self.sender.send(LoadEvent { context_id, state });
    }

    /// 建立新订阅
    pub fn subscribe(&self) -> LoadSubscription {
        LoadSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// 为即将导航的上下文登记订阅
    pub fn register(&self, context_id: ContextId) {
        self.pending.insert(context_id, self.subscribe());
    }

    /// 取出已登记的订阅
    pub fn take(&self, context_id: &ContextId) -> Option<LoadSubscription> {
        self.pending.remove(context_id).map(|(_, subscription)| subscription)
    }

    /// 等待已登记上下文的加载完成事件
    pub async fn wait(&self, context_id: ContextId) -> Result<(), RunnerError> {
        let subscription = self
            .take(&context_id)
            .ok_or(RunnerError::UnknownContext(context_id))?;
        subscription.wait_for(context_id).await
    }

    /// 当前活跃订阅数量
    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LoadEventHub {
    fn default() -> Self {
        Self::new()
    }
}

/// 单次加载完成订阅
pub struct LoadSubscription {
    receiver: broadcast::Receiver<LoadEvent>,
}

impl LoadSubscription {
    /// 等待指定上下文的第一个加载事件，忽略其他上下文
    ///
    /// 无论结果如何，返回时订阅都会被注销
    pub async fn wait_for(mut self, context_id: ContextId) -> Result<(), RunnerError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.context_id == context_id => {
                    return match event.state {
                        LoadState::Complete => Ok(()),
                        LoadState::Failed(reason) => Err(RunnerError::Context(reason)),
                    };
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Load subscription lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(RunnerError::Context(
                        "Load event channel closed".to_string(),
                    ));
                }
            }
        }
    }
}
