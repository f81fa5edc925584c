// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 用例模块
///
/// 包含控制面分派和消息编写用例
pub mod compose_message;
pub mod control_surface;
