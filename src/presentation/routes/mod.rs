// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::use_cases::control_surface::ControlSurface;
use crate::presentation::handlers::{control_handler, queue_handler};
use axum::{
    routing::{delete, get, post},
    Extension, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// 创建应用路由
///
/// # 返回值
///
/// 返回配置好的路由，状态通过 `Extension` 层注入
pub fn routes() -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/v1/version", get(version));

    let api_routes = Router::new()
        .route("/api/message", post(control_handler::handle_message))
        .route("/api/queue", post(queue_handler::add_to_queue))
        .route("/api/queue/{id}", delete(queue_handler::remove))
        .route("/api/queue/{id}/retry", post(queue_handler::retry))
        .route("/api/status", get(queue_handler::get_status))
        .route("/api/start", post(queue_handler::start))
        .route("/api/pause", post(queue_handler::pause))
        .route("/api/clear", post(queue_handler::clear));

    Router::new().merge(public_routes).merge(api_routes)
}

/// 创建带状态和请求追踪的完整应用
pub fn app(surface: Arc<ControlSurface>) -> Router {
    routes()
        .layer(Extension(surface))
        .layer(TraceLayer::new_for_http())
}

/// 健康检查端点
pub async fn health_check() -> &'static str {
    "OK"
}

/// 版本信息端点
pub async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
