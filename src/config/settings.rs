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

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// 应用程序配置设置
///
/// 包含服务器、存储、浏览器、自动化节奏和指标等所有配置项
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 服务器配置
    pub server: ServerSettings,
    /// 存储配置
    pub storage: StorageSettings,
    /// 浏览器配置
    pub browser: BrowserSettings,
    /// 自动化配置
    pub automation: AutomationSettings,
    /// 指标配置
    pub metrics: MetricsSettings,
}

/// 服务器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// 服务器监听主机地址
    pub host: String,
    /// 服务器监听端口
    pub port: u16,
}

/// 存储配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// 存储类型 (local, memory, redis)
    pub storage_type: String,
    /// 本地JSON文件路径 (当 type=local 时使用)
    pub local_path: Option<String>,
    /// Redis连接URL (当 type=redis 时使用)
    pub redis_url: Option<String>,
    /// Redis键前缀
    pub redis_prefix: String,
}

/// 浏览器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserSettings {
    /// 远程调试地址，设置后连接已有的Chrome而不是启动新实例
    pub remote_debugging_url: Option<String>,
    /// 是否无头运行
    pub headless: bool,
    /// 用户数据目录，用于在多次运行之间保留登录状态
    pub user_data_dir: Option<String>,
    /// CDP请求超时时间（秒）
    pub request_timeout_secs: u64,
}

/// 自动化节奏配置
#[derive(Debug, Clone, Deserialize)]
pub struct AutomationSettings {
    /// 页面加载完成后注入脚本前的等待时间（毫秒）
    pub settle_ms: u64,
    /// 发送消息时页面加载后的等待时间（毫秒）
    pub message_settle_ms: u64,
    /// 处理完成后关闭页面前的等待时间（毫秒）
    pub dispose_delay_ms: u64,
    /// 等待页面加载完成的超时时间（秒），0 表示无限等待
    pub load_timeout_secs: u64,
    /// 连接列表页面地址
    pub connections_url: String,
    /// 自定义脚本目录，缺省时使用内置脚本
    pub scripts_dir: Option<String>,
}

impl AutomationSettings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn message_settle_delay(&self) -> Duration {
        Duration::from_millis(self.message_settle_ms)
    }

    pub fn dispose_delay(&self) -> Duration {
        Duration::from_millis(self.dispose_delay_ms)
    }

    /// 页面加载超时，`None` 表示无限等待
    pub fn load_timeout(&self) -> Option<Duration> {
        (self.load_timeout_secs > 0).then(|| Duration::from_secs(self.load_timeout_secs))
    }
}

impl Default for AutomationSettings {
    fn default() -> Self {
        Self {
            settle_ms: 3000,
            message_settle_ms: 2000,
            dispose_delay_ms: 5000,
            load_timeout_secs: 90,
            connections_url: DEFAULT_CONNECTIONS_URL.to_string(),
            scripts_dir: None,
        }
    }
}

/// 指标配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    /// 是否启用Prometheus导出
    pub enabled: bool,
    /// 导出器监听地址
    pub listen: String,
}

/// 默认连接列表页面
pub const DEFAULT_CONNECTIONS_URL: &str =
    "https://www.linkedin.com/mynetwork/invite-connect/connections/";

impl Settings {
    /// 创建新的配置实例
    ///
    /// 从配置文件和环境变量加载配置，支持默认值
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Config::builder()
            // Start with default settings
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3847)?
            // Default Storage settings
            .set_default("storage.storage_type", "local")?
            .set_default("storage.local_path", "./data/store.json")?
            .set_default("storage.redis_prefix", "autoconnect:")?
            // Default Browser settings
            .set_default("browser.headless", false)?
            .set_default("browser.request_timeout_secs", 30)?
            // Default Automation settings
            .set_default("automation.settle_ms", 3000)?
            .set_default("automation.message_settle_ms", 2000)?
            .set_default("automation.dispose_delay_ms", 5000)?
            .set_default("automation.load_timeout_secs", 90)?
            .set_default("automation.connections_url", DEFAULT_CONNECTIONS_URL)?
            // Default Metrics settings
            .set_default("metrics.enabled", false)?
            .set_default("metrics.listen", "127.0.0.1:9000")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("AUTOCONNECT").separator("__"));

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
