// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::dto::control_message::StatusResponse;
use crate::application::use_cases::control_surface::ControlSurface;
use crate::domain::models::queue_entry::ProfileCandidate;
use crate::presentation::errors::AppError;
use axum::{
    extract::{Extension, Path},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

/// 添加主页到队列
///
/// 请求体兼容 `profileUrl` / `name` 字段
pub async fn add_to_queue(
    Extension(surface): Extension<Arc<ControlSurface>>,
    Json(profile): Json<ProfileCandidate>,
) -> Result<Json<Value>, AppError> {
    profile
        .validate()
        .map_err(|e| AppError::bad_request(format!("Invalid profileUrl: {}", e)))?;

    let owner = surface.context().owner();
    let queue = surface.queue();
    let id = queue.add_entry(owner.as_deref(), profile).await?;
    let item = queue
        .list_entries(owner.as_deref())
        .await?
        .into_iter()
        .find(|entry| entry.id == id);

    info!("Added to queue via HTTP: {}", id);
    Ok(Json(json!({ "success": true, "item": item })))
}

/// 获取队列状态，最新条目在前
pub async fn get_status(
    Extension(surface): Extension<Arc<ControlSurface>>,
) -> Result<Json<StatusResponse>, AppError> {
    let owner = surface.context().owner();
    let mut queue = surface.queue().list_entries(owner.as_deref()).await?;
    queue.reverse();
    let is_processing = surface.context().is_processing().await?;
    Ok(Json(StatusResponse::new(queue, is_processing)))
}

/// 开始处理队列
pub async fn start(
    Extension(surface): Extension<Arc<ControlSurface>>,
) -> Result<Json<Value>, AppError> {
    surface.workers().scheduler().start().await?;
    let is_processing = surface.context().is_processing().await?;
    Ok(Json(json!({ "success": true, "isProcessing": is_processing })))
}

/// 暂停处理
pub async fn pause(
    Extension(surface): Extension<Arc<ControlSurface>>,
) -> Result<Json<Value>, AppError> {
    surface.workers().scheduler().pause().await?;
    Ok(Json(json!({ "success": true, "isProcessing": false })))
}

/// 清除所有待处理条目
pub async fn clear(
    Extension(surface): Extension<Arc<ControlSurface>>,
) -> Result<Json<Value>, AppError> {
    let owner = surface.context().owner();
    let removed = surface.queue().clear_pending(owner.as_deref()).await?;
    Ok(Json(json!({ "success": true, "removed": removed })))
}

/// 删除条目
pub async fn remove(
    Extension(surface): Extension<Arc<ControlSurface>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let owner = surface.context().owner();
    surface.queue().remove_entry(owner.as_deref(), &id).await?;
    Ok(Json(json!({ "success": true })))
}

/// 重试失败条目
pub async fn retry(
    Extension(surface): Extension<Arc<ControlSurface>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let owner = surface.context().owner();
    surface.queue().retry_entry(owner.as_deref(), &id).await?;
    Ok(Json(json!({ "success": true })))
}
