// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 提供后台任务处理和工作器管理功能
/// 包括单个作业的执行、连接状态对账和定时器生命周期管理
pub mod job_executor;
pub mod manager;
pub mod reconcile_worker;
pub mod worker;

pub use worker::Worker;
