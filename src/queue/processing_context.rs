// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::user_settings::UserSettings;
use crate::domain::repositories::storage_repository::{
    read_key, write_key, KeyValueStore, StorageError, PROCESSING_KEY, SETTINGS_KEY,
};
use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use validator::{Validate, ValidationErrors};

/// 设置错误类型
#[derive(Error, Debug)]
pub enum SettingsError {
    /// 设置校验失败
    #[error("Invalid settings: {0}")]
    Invalid(#[from] ValidationErrors),

    /// 用户标识无效
    #[error("Invalid user: {0}")]
    InvalidUser(String),

    /// 存储错误
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// 进程级处理上下文
///
/// 保存持久化的处理标志、用户设置访问器，以及由客户端通过 `setUser` 设置的当前所有者
pub struct ProcessingContext {
    store: Arc<dyn KeyValueStore>,
    current_owner: RwLock<Option<String>>,
}

impl ProcessingContext {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            current_owner: RwLock::new(None),
        }
    }

    /// 读取持久化的处理标志，不存在时为 `false`
    pub async fn is_processing(&self) -> Result<bool, StorageError> {
        Ok(read_key::<bool, _>(self.store.as_ref(), PROCESSING_KEY)
            .await?
            .unwrap_or(false))
    }

    /// 写入处理标志
    pub async fn set_processing(&self, processing: bool) -> Result<(), StorageError> {
        debug!("Processing flag set to {}", processing);
        write_key(self.store.as_ref(), PROCESSING_KEY, &processing).await
    }

    /// 当前所有者，`None` 表示旧版默认分区
    pub fn owner(&self) -> Option<String> {
        self.current_owner.read().clone()
    }

    /// 设置当前所有者
    pub fn set_owner(&self, owner: &str) -> Result<String, SettingsError> {
        let owner = owner.trim();
        if owner.is_empty() {
            return Err(SettingsError::InvalidUser(
                "user must not be empty".to_string(),
            ));
        }
        *self.current_owner.write() = Some(owner.to_string());
        info!("Current user set to {}", owner);
        Ok(owner.to_string())
    }

    /// 读取用户设置
    ///
    /// 首次读取时写入默认值
    pub async fn settings(&self) -> Result<UserSettings, StorageError> {
        match read_key::<UserSettings, _>(self.store.as_ref(), SETTINGS_KEY).await? {
            Some(settings) => Ok(settings),
            None => {
                let settings = UserSettings::default();
                write_key(self.store.as_ref(), SETTINGS_KEY, &settings).await?;
                Ok(settings)
            }
        }
    }

    /// 校验并保存用户设置
    pub async fn save_settings(&self, settings: &UserSettings) -> Result<(), SettingsError> {
        settings.validate()?;
        write_key(self.store.as_ref(), SETTINGS_KEY, settings).await?;
        info!(
            "Settings saved: delay {}-{} min, check every {} min",
            settings.min_delay_minutes, settings.max_delay_minutes, settings.check_interval_minutes
        );
        Ok(())
    }
}
