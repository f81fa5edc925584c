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

use crate::domain::models::queue_entry::{EntryStatus, ProfileCandidate, QueueEntry};
use crate::domain::models::user_settings::UserSettings;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// 所有受支持的动作名
pub const ACTIONS: &[&str] = &[
    "addToQueue",
    "removeFromQueue",
    "removeByUrl",
    "retryItem",
    "getStatus",
    "getSettings",
    "setSettings",
    "start",
    "pause",
    "connectNow",
    "checkConnectionsNow",
    "isInQueue",
    "setUser",
    "getUser",
    "clear",
    "getAcceptedConnections",
    "sendMessage",
];

/// 控制消息请求
///
/// 以 `action` 字段区分动作，字段名为 camelCase
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ControlRequest {
    AddToQueue {
        profile: ProfileCandidate,
    },
    RemoveFromQueue {
        #[serde(deserialize_with = "string_or_number")]
        id: String,
    },
    RemoveByUrl {
        #[serde(rename = "targetUrl", alias = "profileUrl")]
        target_url: String,
    },
    RetryItem {
        #[serde(deserialize_with = "string_or_number")]
        id: String,
    },
    GetStatus,
    GetSettings,
    SetSettings {
        settings: UserSettings,
    },
    Start,
    Pause,
    ConnectNow,
    CheckConnectionsNow,
    IsInQueue {
        #[serde(rename = "targetUrl", alias = "profileUrl")]
        target_url: String,
    },
    SetUser {
        user: String,
    },
    GetUser,
    Clear,
    GetAcceptedConnections,
    SendMessage {
        #[serde(rename = "targetUrl", alias = "profileUrl")]
        target_url: String,
        message: String,
    },
}

/// 条目ID兼容旧版客户端发送的数字形式
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    })
}

/// 通用确认响应
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ack {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl Ack {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            count: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            count: None,
        }
    }

    pub fn with_count(count: usize) -> Self {
        Self {
            count: Some(count),
            ..Self::ok()
        }
    }
}

/// 队列状态响应
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub queue: Vec<QueueEntry>,
    pub is_processing: bool,
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub connected: usize,
}

impl StatusResponse {
    pub fn new(queue: Vec<QueueEntry>, is_processing: bool) -> Self {
        let count = |status: EntryStatus| queue.iter().filter(|e| e.status == status).count();
        Self {
            total: queue.len(),
            pending: count(EntryStatus::Pending),
            processing: count(EntryStatus::Processing),
            completed: count(EntryStatus::Completed),
            failed: count(EntryStatus::Failed),
            connected: count(EntryStatus::Connected),
            is_processing,
            queue,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InQueueResponse {
    pub in_queue: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EntryStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    pub user: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedConnectionsResponse {
    pub connections: Vec<String>,
    pub last_check: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// 控制消息响应
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ControlResponse {
    Ack(Ack),
    Status(StatusResponse),
    Settings(UserSettings),
    InQueue(InQueueResponse),
    User(UserResponse),
    AcceptedConnections(AcceptedConnectionsResponse),
    Error(ErrorResponse),
}

impl ControlResponse {
    pub fn unknown_action() -> Self {
        ControlResponse::Error(ErrorResponse {
            error: "Unknown action".to_string(),
        })
    }
}

impl From<Ack> for ControlResponse {
    fn from(ack: Ack) -> Self {
        ControlResponse::Ack(ack)
    }
}
