// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::use_cases::control_surface::ControlSurface;
use axum::{extract::Extension, Json};
use serde_json::Value;
use std::sync::Arc;

/// 处理原始控制消息
///
/// 请求体即控制消息本身，响应为对应动作的结果
pub async fn handle_message(
    Extension(surface): Extension<Arc<ControlSurface>>,
    Json(message): Json<Value>,
) -> Json<Value> {
    Json(surface.dispatch_value(message).await)
}
