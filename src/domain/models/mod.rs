// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 队列条目（queue_entry）：一个待发送连接请求的目标主页及其状态
/// - 用户设置（user_settings）：节奏和对账周期
/// - 已接受连接（accepted_connections）：最近一次对账抓取的结果
pub mod accepted_connections;
pub mod queue_entry;
pub mod user_settings;
