// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含系统的核心业务实体和存储接口：
/// - 领域模型（models）：队列条目、用户设置和已接受连接
/// - 仓库接口（repositories）：键值存储抽象
pub mod models;
pub mod repositories;
