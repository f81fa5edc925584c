// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::config::settings::StorageSettings;
use crate::domain::repositories::storage_repository::{KeyValueStore, StorageError};
use crate::infrastructure::cache::redis_client::RedisClient;

/// 本地JSON文件存储实现
///
/// 所有键保存在同一个JSON文档中，首次访问时加载，
/// 每次写入先写临时文件再重命名，避免进程中断留下半个文件。
pub struct LocalStorage {
    path: PathBuf,
    document: Mutex<Option<Map<String, Value>>>,
}

impl LocalStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            document: Mutex::new(None),
        }
    }

    async fn load(&self) -> Result<Map<String, Value>, StorageError> {
        match fs::read(&self.path).await {
            Ok(data) if data.is_empty() => Ok(Map::new()),
            Ok(data) => {
                let document: Map<String, Value> = serde_json::from_slice(&data)?;
                info!(
                    "Loaded {} keys from {}",
                    document.len(),
                    self.path.display()
                );
                Ok(document)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn persist(&self, document: &Map<String, Value>) -> Result<(), StorageError> {
        // 确保目录存在
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let data = serde_json::to_vec_pretty(document)?;
        let tmp_path = self.path.with_extension("json.tmp");

        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(&data).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp_path, &self.path).await?;
        debug!("Persisted store to {}", self.path.display());
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for LocalStorage {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StorageError> {
        let mut guard = self.document.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await?);
        }
        let Some(document) = guard.as_ref() else {
            return Ok(HashMap::new());
        };

        Ok(keys
            .iter()
            .filter_map(|key| document.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, entries: HashMap<String, Value>) -> Result<(), StorageError> {
        let mut guard = self.document.lock().await;
        let mut document = match guard.as_ref() {
            Some(document) => document.clone(),
            None => self.load().await?,
        };

        for (key, value) in entries {
            document.insert(key, value);
        }

        // 写盘失败时缓存保持上一次成功写入的内容
        self.persist(&document).await?;
        *guard = Some(document);
        Ok(())
    }
}

/// 内存存储实现（用于测试和 `memory` 存储类型）
pub struct InMemoryStorage {
    data: RwLock<HashMap<String, Value>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStorage {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StorageError> {
        let map = self.data.read().await;
        Ok(keys
            .iter()
            .filter_map(|key| map.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, entries: HashMap<String, Value>) -> Result<(), StorageError> {
        let mut map = self.data.write().await;
        map.extend(entries);
        Ok(())
    }
}

/// Redis存储实现
///
/// 每个键以JSON字符串形式保存在 `prefix + key` 下，批量写入使用 MSET。
pub struct RedisStorage {
    client: RedisClient,
    prefix: String,
}

impl RedisStorage {
    pub fn new(client: RedisClient, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: prefix.into(),
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl KeyValueStore for RedisStorage {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StorageError> {
        let full_keys: Vec<String> = keys.iter().map(|key| self.full_key(key)).collect();
        let values = self
            .client
            .get_many(&full_keys)
            .await
            .map_err(|e| StorageError::Other(e.to_string()))?;

        let mut result = HashMap::new();
        for (key, raw) in keys.iter().zip(values) {
            if let Some(raw) = raw {
                result.insert(key.to_string(), serde_json::from_str(&raw)?);
            }
        }
        Ok(result)
    }

    async fn set(&self, entries: HashMap<String, Value>) -> Result<(), StorageError> {
        let mut items = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            items.push((self.full_key(&key), serde_json::to_string(&value)?));
        }
        self.client
            .set_many(&items)
            .await
            .map_err(|e| StorageError::Other(e.to_string()))
    }
}

/// 存储工厂函数
pub async fn create_storage_repository(
    settings: &StorageSettings,
) -> Result<Arc<dyn KeyValueStore>, StorageError> {
    match settings.storage_type.as_str() {
        "local" => {
            let path = settings
                .local_path
                .clone()
                .unwrap_or_else(|| "./data/store.json".to_string());
            info!("Using local JSON store at {}", path);
            Ok(Arc::new(LocalStorage::new(path)))
        }
        "memory" => {
            info!("Using in-memory store; state will not survive restarts");
            Ok(Arc::new(InMemoryStorage::new()))
        }
        "redis" => {
            let url = settings
                .redis_url
                .as_deref()
                .ok_or_else(|| StorageError::Other("storage.redis_url is required".into()))?;
            let client = RedisClient::new(url)
                .await
                .map_err(|e| StorageError::Other(e.to_string()))?;
            info!("Using Redis store");
            Ok(Arc::new(RedisStorage::new(client, settings.redis_prefix.clone())))
        }
        other => Err(StorageError::Other(format!(
            "Unsupported storage type: {}",
            other
        ))),
    }
}
