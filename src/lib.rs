// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 包含控制消息和用例
pub mod application;

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含队列条目、用户设置等核心实体和存储接口
pub mod domain;

/// 引擎模块
///
/// 实现页面动作执行器和加载事件
pub mod engines;

/// 基础设施模块
///
/// 提供存储后端、Redis客户端和指标导出
pub mod infrastructure;

/// 表示层模块
///
/// 处理HTTP请求和响应，包括路由和处理器
pub mod presentation;

/// 队列模块
///
/// 实现队列管理、处理上下文和作业调度
pub mod queue;

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
pub mod utils;

/// 工作器模块
///
/// 实现作业执行、连接对账和工作器管理
pub mod workers;
