// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::queue::queue_manager::QueueError;
use crate::queue::scheduler::SchedulerError;

/// 应用错误类型
///
/// 封装所有可能的应用层错误，提供统一的错误处理接口
#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(anyhow::Error::new(BadRequest(message.into())))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct BadRequest(String);

fn queue_status(err: &QueueError) -> StatusCode {
    match err {
        QueueError::Duplicate | QueueError::InvalidOwner(_) => StatusCode::BAD_REQUEST,
        QueueError::NotFound => StatusCode::NOT_FOUND,
        QueueError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_message = self.0.to_string();

        let status = if let Some(err) = self.0.downcast_ref::<QueueError>() {
            queue_status(err)
        } else if let Some(err) = self.0.downcast_ref::<SchedulerError>() {
            match err {
                SchedulerError::NoPending => StatusCode::BAD_REQUEST,
                SchedulerError::Queue(inner) => queue_status(inner),
                SchedulerError::Storage(_) | SchedulerError::InvalidDelay(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            }
        } else if self.0.downcast_ref::<BadRequest>().is_some() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
