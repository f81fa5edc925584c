// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::{Validate, ValidationError};

/// 默认最小间隔（分钟）
pub const DEFAULT_MIN_DELAY_MINUTES: f64 = 1.0;
/// 默认最大间隔（分钟）
pub const DEFAULT_MAX_DELAY_MINUTES: f64 = 3.0;
/// 默认对账周期（分钟）
pub const DEFAULT_CHECK_INTERVAL_MINUTES: f64 = 5.0;
/// 任一设置允许的上限（一周）
pub const MAX_SETTING_MINUTES: f64 = 10_080.0;

/// 用户节奏设置
///
/// 控制两次连接请求之间的随机间隔，以及接受状态对账的周期。
/// 兼容旧版存储中的 `minDelay` / `maxDelay` / `checkInterval` 字段。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_delay_order", skip_on_field_errors = false))]
pub struct UserSettings {
    /// 最小间隔（分钟）
    #[serde(alias = "minDelay", default = "default_min_delay")]
    #[validate(range(exclusive_min = 0.0, max = 10_080.0))]
    pub min_delay_minutes: f64,
    /// 最大间隔（分钟）
    #[serde(alias = "maxDelay", default = "default_max_delay")]
    #[validate(range(exclusive_min = 0.0, max = 10_080.0))]
    pub max_delay_minutes: f64,
    /// 对账周期（分钟）
    #[serde(alias = "checkInterval", default = "default_check_interval")]
    #[validate(range(exclusive_min = 0.0, max = 10_080.0))]
    pub check_interval_minutes: f64,
}

fn default_min_delay() -> f64 {
    DEFAULT_MIN_DELAY_MINUTES
}

fn default_max_delay() -> f64 {
    DEFAULT_MAX_DELAY_MINUTES
}

fn default_check_interval() -> f64 {
    DEFAULT_CHECK_INTERVAL_MINUTES
}

fn validate_delay_order(settings: &UserSettings) -> Result<(), ValidationError> {
    if settings.min_delay_minutes > settings.max_delay_minutes {
        let mut error = ValidationError::new("delay_order");
        error.message = Some("minDelayMinutes must not exceed maxDelayMinutes".into());
        return Err(error);
    }
    Ok(())
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            min_delay_minutes: DEFAULT_MIN_DELAY_MINUTES,
            max_delay_minutes: DEFAULT_MAX_DELAY_MINUTES,
            check_interval_minutes: DEFAULT_CHECK_INTERVAL_MINUTES,
        }
    }
}

/// 分钟数转换为时长，负数、NaN 或溢出时返回 `None`
pub fn minutes_to_duration(minutes: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(minutes * 60.0).ok()
}

impl UserSettings {
    /// 对账周期
    ///
    /// 存储中的值无法作为周期使用时回退到默认周期
    pub fn check_interval(&self) -> Duration {
        minutes_to_duration(self.check_interval_minutes)
            .filter(|period| !period.is_zero())
            .unwrap_or(Duration::from_secs(DEFAULT_CHECK_INTERVAL_MINUTES as u64 * 60))
    }
}
