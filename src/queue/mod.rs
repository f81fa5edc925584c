// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 队列模块
///
/// 提供队列管理和作业调度功能
/// 负责条目的增删改查、处理标志以及随机间隔的衔接调度
pub mod processing_context;
pub mod queue_manager;
pub mod scheduler;
