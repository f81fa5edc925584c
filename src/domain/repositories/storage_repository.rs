// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// 存储键：用户设置
pub const SETTINGS_KEY: &str = "settings";
/// 存储键：按所有者分区的队列
pub const QUEUES_KEY: &str = "queues";
/// 存储键：无所有者时使用的旧版队列
pub const LEGACY_QUEUE_KEY: &str = "queue";
/// 存储键：处理标志
pub const PROCESSING_KEY: &str = "isProcessing";
/// 存储键：已接受连接的用户名
pub const ACCEPTED_CONNECTIONS_KEY: &str = "acceptedConnections";
/// 存储键：最近一次连接检查时间
pub const LAST_CONNECTION_CHECK_KEY: &str = "lastConnectionCheck";

/// 存储错误类型
#[derive(Error, Debug)]
pub enum StorageError {
    /// IO错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// 存储错误
    #[error("Storage error: {0}")]
    Other(String),
}

/// 键值存储特质
///
/// 持久化的命名键到JSON值映射，进程重启后仍然保留。
/// 每个键遵循“最后写入者获胜”，不提供事务。
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// 读取一组键，只返回存在的键
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StorageError>;

    /// 批量写入键值
    async fn set(&self, entries: HashMap<String, Value>) -> Result<(), StorageError>;
}

#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StorageError> {
        (**self).get(keys).await
    }

    async fn set(&self, entries: HashMap<String, Value>) -> Result<(), StorageError> {
        (**self).set(entries).await
    }
}

/// 读取单个键并反序列化
///
/// 键不存在时返回 `Ok(None)`
pub async fn read_key<T, S>(store: &S, key: &str) -> Result<Option<T>, StorageError>
where
    T: DeserializeOwned,
    S: KeyValueStore + ?Sized,
{
    let mut values = store.get(&[key]).await?;
    match values.remove(key) {
        Some(Value::Null) | None => Ok(None),
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
    }
}

/// 序列化并写入单个键
pub async fn write_key<T, S>(store: &S, key: &str, value: &T) -> Result<(), StorageError>
where
    T: Serialize + ?Sized,
    S: KeyValueStore + ?Sized,
{
    let mut entries = HashMap::new();
    entries.insert(key.to_string(), serde_json::to_value(value)?);
    store.set(entries).await
}
