// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::queue_entry::{EntryStatus, ProfileCandidate, QueueEntry};
use crate::domain::repositories::storage_repository::{
    KeyValueStore, StorageError, LEGACY_QUEUE_KEY, QUEUES_KEY,
};
use crate::utils::url_utils::normalize_profile_url;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// 无法完成的处理结果写回时使用的失败原因
pub const INTERRUPTED_ERROR: &str = "Interrupted before completion";

/// 队列错误类型
#[derive(Error, Debug)]
pub enum QueueError {
    /// 目标URL已在队列中
    #[error("Already in queue")]
    Duplicate,

    /// 条目不存在或状态不允许该操作
    #[error("Item not found")]
    NotFound,

    /// 所有者标识无效
    #[error("Invalid owner: {0}")]
    InvalidOwner(String),

    /// 存储错误
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        QueueError::Storage(StorageError::Serialization(err))
    }
}

type OwnerQueues = HashMap<String, Vec<QueueEntry>>;

/// 队列管理器
///
/// 管理按所有者分区的队列条目。所有修改都持有进程级写锁，
/// 并在写入前重新读取存储，执行器与对账器的更新不会互相覆盖。
pub struct QueueManager {
    store: Arc<dyn KeyValueStore>,
    write_lock: Mutex<()>,
}

impl QueueManager {
    /// 创建新的队列管理器
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// 底层存储
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    async fn load_queues(&self) -> Result<OwnerQueues, QueueError> {
        let mut values = self.store.get(&[QUEUES_KEY]).await?;
        match values.remove(QUEUES_KEY) {
            Some(Value::Null) | None => Ok(HashMap::new()),
            Some(value) => Ok(serde_json::from_value(value)?),
        }
    }

    async fn load_legacy(&self) -> Result<Vec<QueueEntry>, QueueError> {
        let mut values = self.store.get(&[LEGACY_QUEUE_KEY]).await?;
        match values.remove(LEGACY_QUEUE_KEY) {
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(value) => Ok(serde_json::from_value(value)?),
        }
    }

    /// 读取某个分区的条目
    async fn load(&self, owner: Option<&str>) -> Result<Vec<QueueEntry>, QueueError> {
        match owner {
            None => self.load_legacy().await,
            Some(owner) => {
                let owner = validate_owner(owner)?;
                let mut queues = self.load_queues().await?;
                Ok(queues.remove(owner).unwrap_or_default())
            }
        }
    }

    /// 写回某个分区的条目
    ///
    /// 调用方必须持有写锁；分区队列在写入前重新读取，保留其他所有者的数据
    async fn save(&self, owner: Option<&str>, entries: Vec<QueueEntry>) -> Result<(), QueueError> {
        let mut payload = HashMap::new();
        match owner {
            None => {
                payload.insert(LEGACY_QUEUE_KEY.to_string(), serde_json::to_value(&entries)?);
            }
            Some(owner) => {
                let mut queues = self.load_queues().await?;
                queues.insert(owner.to_string(), entries);
                payload.insert(QUEUES_KEY.to_string(), serde_json::to_value(&queues)?);
            }
        }
        self.store.set(payload).await?;
        Ok(())
    }

    /// 在写锁内读取、修改并写回一个分区
    ///
    /// 闭包返回 `(结果, 是否需要写入)`
    async fn mutate<T, F>(&self, owner: Option<&str>, f: F) -> Result<T, QueueError>
    where
        F: FnOnce(&mut Vec<QueueEntry>) -> Result<(T, bool), QueueError>,
    {
        if let Some(owner) = owner {
            validate_owner(owner)?;
        }
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load(owner).await?;
        let (result, dirty) = f(&mut entries)?;
        if dirty {
            self.save(owner, entries).await?;
        }
        Ok(result)
    }

    /// 添加条目
    ///
    /// # 返回值
    ///
    /// * `Ok(String)` - 新条目ID
    /// * `Err(QueueError::Duplicate)` - 该URL已在队列中（任意状态）
    pub async fn add_entry(
        &self,
        owner: Option<&str>,
        mut candidate: ProfileCandidate,
    ) -> Result<String, QueueError> {
        candidate.target_url = normalize_profile_url(&candidate.target_url);
        let id = self
            .mutate(owner, move |entries| {
                if entries
                    .iter()
                    .any(|entry| entry.target_url == candidate.target_url)
                {
                    return Err(QueueError::Duplicate);
                }
                let entry = QueueEntry::from_candidate(candidate);
                let id = entry.id.clone();
                entries.push(entry);
                Ok((id, true))
            })
            .await?;
        debug!("Added queue entry {} for owner {:?}", id, owner);
        Ok(id)
    }

    /// 按ID删除条目，不存在时视为成功
    pub async fn remove_entry(&self, owner: Option<&str>, id: &str) -> Result<(), QueueError> {
        self.mutate(owner, |entries| {
            let before = entries.len();
            entries.retain(|entry| entry.id != id);
            Ok(((), entries.len() != before))
        })
        .await
    }

    /// 按URL删除条目，不存在时视为成功
    pub async fn remove_by_url(&self, owner: Option<&str>, url: &str) -> Result<(), QueueError> {
        let url = normalize_profile_url(url);
        self.mutate(owner, |entries| {
            let before = entries.len();
            entries.retain(|entry| entry.target_url != url);
            Ok(((), entries.len() != before))
        })
        .await
    }

    /// 重试失败条目
    ///
    /// 仅 `failed` 条目会回到 `pending`，其余情况返回 `NotFound` 且不做修改
    pub async fn retry_entry(&self, owner: Option<&str>, id: &str) -> Result<(), QueueError> {
        self.mutate(owner, |entries| {
            let entry = entries
                .iter_mut()
                .find(|entry| entry.id == id)
                .ok_or(QueueError::NotFound)?;
            if !entry.reset_for_retry() {
                return Err(QueueError::NotFound);
            }
            Ok(((), true))
        })
        .await
    }

    /// 按插入顺序列出条目
    pub async fn list_entries(&self, owner: Option<&str>) -> Result<Vec<QueueEntry>, QueueError> {
        self.load(owner).await
    }

    /// 删除所有 `pending` 条目
    ///
    /// # 返回值
    ///
    /// 被删除的条目数量
    pub async fn clear_pending(&self, owner: Option<&str>) -> Result<usize, QueueError> {
        self.mutate(owner, |entries| {
            let before = entries.len();
            entries.retain(|entry| entry.status != EntryStatus::Pending);
            let removed = before - entries.len();
            Ok((removed, removed > 0))
        })
        .await
    }

    /// 按URL查找条目
    pub async fn find_by_url(
        &self,
        owner: Option<&str>,
        url: &str,
    ) -> Result<Option<QueueEntry>, QueueError> {
        let url = normalize_profile_url(url);
        Ok(self
            .load(owner)
            .await?
            .into_iter()
            .find(|entry| entry.target_url == url))
    }

    /// 按插入顺序返回第一个 `pending` 条目
    pub async fn next_pending(&self, owner: Option<&str>) -> Result<Option<QueueEntry>, QueueError> {
        Ok(self
            .load(owner)
            .await?
            .into_iter()
            .find(|entry| entry.status == EntryStatus::Pending))
    }

    /// `pending` 条目数量
    pub async fn pending_count(&self, owner: Option<&str>) -> Result<usize, QueueError> {
        Ok(self
            .load(owner)
            .await?
            .iter()
            .filter(|entry| entry.status == EntryStatus::Pending)
            .count())
    }

    /// 对单个条目执行读取-修改-写回
    ///
    /// # 返回值
    ///
    /// * `Ok(Some(entry))` - 修改后的条目
    /// * `Ok(None)` - 条目已不存在，不会重新创建
    pub async fn update_entry<F>(
        &self,
        owner: Option<&str>,
        id: &str,
        f: F,
    ) -> Result<Option<QueueEntry>, QueueError>
    where
        F: FnOnce(&mut QueueEntry) + Send,
    {
        self.mutate(owner, |entries| {
            match entries.iter_mut().find(|entry| entry.id == id) {
                Some(entry) => {
                    f(entry);
                    Ok((Some(entry.clone()), true))
                }
                None => Ok((None, false)),
            }
        })
        .await
    }

    /// 将用户名在已接受集合中的条目标记为 `connected`
    ///
    /// 遍历所有所有者分区和旧版分区，变更的键在一次写入中提交；
    /// 没有任何变化时不写入。
    ///
    /// # 返回值
    ///
    /// 本次新标记的条目数量
    pub async fn mark_connected(&self, usernames: &HashSet<String>) -> Result<usize, QueueError> {
        let _guard = self.write_lock.lock().await;
        let mut queues = self.load_queues().await?;
        let mut legacy = self.load_legacy().await?;

        let mut updated = 0;
        let mut queues_changed = false;
        for entries in queues.values_mut() {
            let count = promote_connected(entries, usernames);
            queues_changed |= count > 0;
            updated += count;
        }
        let legacy_count = promote_connected(&mut legacy, usernames);
        updated += legacy_count;

        let mut payload = HashMap::new();
        if queues_changed {
            payload.insert(QUEUES_KEY.to_string(), serde_json::to_value(&queues)?);
        }
        if legacy_count > 0 {
            payload.insert(LEGACY_QUEUE_KEY.to_string(), serde_json::to_value(&legacy)?);
        }
        if !payload.is_empty() {
            self.store.set(payload).await?;
            info!("Marked {} queue entries as connected", updated);
        }
        Ok(updated)
    }

    /// 启动恢复：将遗留的 `processing` 条目标记为失败
    ///
    /// # 返回值
    ///
    /// 被标记的条目数量
    pub async fn fail_interrupted(&self) -> Result<usize, QueueError> {
        let _guard = self.write_lock.lock().await;
        let mut queues = self.load_queues().await?;
        let mut legacy = self.load_legacy().await?;

        let mut recovered = 0;
        let mut queues_changed = false;
        for entries in queues.values_mut() {
            let count = fail_processing(entries);
            queues_changed |= count > 0;
            recovered += count;
        }
        let legacy_count = fail_processing(&mut legacy);
        recovered += legacy_count;

        let mut payload = HashMap::new();
        if queues_changed {
            payload.insert(QUEUES_KEY.to_string(), serde_json::to_value(&queues)?);
        }
        if legacy_count > 0 {
            payload.insert(LEGACY_QUEUE_KEY.to_string(), serde_json::to_value(&legacy)?);
        }
        if !payload.is_empty() {
            self.store.set(payload).await?;
        }
        Ok(recovered)
    }
}

fn validate_owner(owner: &str) -> Result<&str, QueueError> {
    if owner.trim().is_empty() {
        return Err(QueueError::InvalidOwner("owner must not be empty".to_string()));
    }
    Ok(owner)
}

fn promote_connected(entries: &mut [QueueEntry], usernames: &HashSet<String>) -> usize {
    let mut count = 0;
    for entry in entries.iter_mut() {
        if entry.status == EntryStatus::Connected {
            continue;
        }
        let matched = crate::utils::url_utils::profile_username(&entry.target_url)
            .is_some_and(|name| usernames.contains(&name));
        if matched {
            entry.mark_connected();
            count += 1;
        }
    }
    count
}

fn fail_processing(entries: &mut [QueueEntry]) -> usize {
    let mut count = 0;
    for entry in entries.iter_mut() {
        if entry.status == EntryStatus::Processing {
            entry.mark_failed(INTERRUPTED_ERROR);
            count += 1;
        }
    }
    count
}
