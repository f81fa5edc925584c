// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};
use validator::Validate;

/// 队列条目
///
/// 表示一个待发送连接请求的目标主页。条目按插入顺序保存，
/// `target_url` 在同一个所有者的队列中唯一。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    /// 条目唯一标识符（创建时的毫秒时间戳）
    pub id: String,
    /// 目标主页URL，同时作为去重键
    #[serde(alias = "profileUrl")]
    pub target_url: String,
    /// 显示名称，仅供展示
    #[serde(alias = "name", default = "default_display_name")]
    pub display_name: String,
    /// 职位描述，仅供展示
    #[serde(default)]
    pub headline: String,
    /// 条目状态
    pub status: EntryStatus,
    /// 失败原因，仅在 `failed` 状态下设置
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 加入队列时间
    pub added_at: DateTime<Utc>,
    /// 完成时间
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// 确认已建立连接的时间
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
}

fn default_display_name() -> String {
    "Unknown".to_string()
}

/// 条目状态枚举
///
/// 状态转换遵循以下流程：
/// Pending → Processing → Completed/Failed，Failed → Pending（重试），
/// 以及任意非 Connected 状态 → Connected（对账发现对方已接受）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// 等待处理
    #[default]
    Pending,
    /// 正在处理
    Processing,
    /// 连接请求已发送
    Completed,
    /// 处理失败
    Failed,
    /// 对方已接受连接请求
    Connected,
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EntryStatus::Pending => write!(f, "pending"),
            EntryStatus::Processing => write!(f, "processing"),
            EntryStatus::Completed => write!(f, "completed"),
            EntryStatus::Failed => write!(f, "failed"),
            EntryStatus::Connected => write!(f, "connected"),
        }
    }
}

impl FromStr for EntryStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EntryStatus::Pending),
            "processing" => Ok(EntryStatus::Processing),
            "completed" => Ok(EntryStatus::Completed),
            "failed" => Ok(EntryStatus::Failed),
            "connected" => Ok(EntryStatus::Connected),
            _ => Err(()),
        }
    }
}

/// 待加入队列的候选主页
///
/// 由内容脚本或弹出页面提交，字段名兼容旧版 `profileUrl` / `name`。
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileCandidate {
    /// 目标主页URL
    #[serde(alias = "profileUrl")]
    #[validate(url)]
    pub target_url: String,
    /// 显示名称
    #[serde(alias = "name", default)]
    pub display_name: Option<String>,
    /// 职位描述
    #[serde(default)]
    pub headline: Option<String>,
}

impl ProfileCandidate {
    pub fn new(target_url: impl Into<String>) -> Self {
        Self {
            target_url: target_url.into(),
            display_name: None,
            headline: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

static LAST_ENTRY_ID: AtomicI64 = AtomicI64::new(0);

/// 生成条目ID
///
/// 使用当前毫秒时间戳；同一毫秒内创建的条目顺延一毫秒，保证进程内单调递增。
pub fn next_entry_id(now: DateTime<Utc>) -> String {
    let candidate = now.timestamp_millis();
    let mut last = LAST_ENTRY_ID.load(Ordering::SeqCst);
    loop {
        let next = candidate.max(last + 1);
        match LAST_ENTRY_ID.compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => return next.to_string(),
            Err(current) => last = current,
        }
    }
}

impl QueueEntry {
    /// 根据候选主页创建一个新的待处理条目
    pub fn from_candidate(candidate: ProfileCandidate) -> Self {
        let now = Utc::now();
        Self {
            id: next_entry_id(now),
            target_url: candidate.target_url,
            display_name: candidate
                .display_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(default_display_name),
            headline: candidate.headline.unwrap_or_default(),
            status: EntryStatus::Pending,
            error: None,
            added_at: now,
            completed_at: None,
            connected_at: None,
        }
    }

    /// 标记为处理中
    pub fn mark_processing(&mut self) {
        self.status = EntryStatus::Processing;
    }

    /// 标记为已完成
    pub fn mark_completed(&mut self) {
        self.status = EntryStatus::Completed;
        self.error = None;
        self.completed_at = Some(Utc::now());
    }

    /// 标记为失败并记录原因
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = EntryStatus::Failed;
        self.error = Some(error.into());
    }

    /// 标记为已连接
    ///
    /// `error` 字段保持不变，以保留先前失败的原因。
    pub fn mark_connected(&mut self) {
        self.status = EntryStatus::Connected;
        self.connected_at = Some(Utc::now());
    }

    /// 失败条目重新入队
    ///
    /// # 返回值
    ///
    /// 仅当条目处于 `failed` 状态时返回 `true`
    pub fn reset_for_retry(&mut self) -> bool {
        if self.status != EntryStatus::Failed {
            return false;
        }
        self.status = EntryStatus::Pending;
        self.error = None;
        self.completed_at = None;
        true
    }
}
