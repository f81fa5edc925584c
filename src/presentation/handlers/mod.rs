// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// HTTP请求处理器模块
///
/// 包含各个API端点的具体处理逻辑
/// 控制消息端点直接转发到控制面，队列端点提供REST风格的访问
pub mod control_handler;
pub mod queue_handler;
