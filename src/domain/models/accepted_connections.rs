// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

/// 已接受连接缓存
///
/// 以用户名列表的形式存储，对账器每次整体替换，不做增量合并。
/// 检查时间单独保存在 `lastConnectionCheck` 中。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AcceptedConnections {
    /// 已连接对方的用户名（小写）
    pub usernames: Vec<String>,
}

impl AcceptedConnections {
    pub fn new(usernames: Vec<String>) -> Self {
        Self { usernames }
    }
}
