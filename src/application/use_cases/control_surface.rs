// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::dto::control_message::{
    AcceptedConnectionsResponse, Ack, ControlRequest, ControlResponse, InQueueResponse,
    StatusResponse, UserResponse, ACTIONS,
};
use crate::application::use_cases::compose_message::MessageComposer;
use crate::domain::models::accepted_connections::AcceptedConnections;
use crate::domain::models::queue_entry::{EntryStatus, ProfileCandidate};
use crate::domain::models::user_settings::UserSettings;
use crate::domain::repositories::storage_repository::{
    read_key, StorageError, ACCEPTED_CONNECTIONS_KEY, LAST_CONNECTION_CHECK_KEY,
};
use crate::queue::processing_context::ProcessingContext;
use crate::queue::queue_manager::QueueManager;
use crate::workers::manager::WorkerManager;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, warn};
use validator::Validate;

/// 控制面
///
/// 将控制消息分派到队列、调度器和对账器，每个请求恰好产生一个响应
pub struct ControlSurface {
    queue: Arc<QueueManager>,
    context: Arc<ProcessingContext>,
    workers: Arc<WorkerManager>,
    composer: Arc<MessageComposer>,
}

fn failure(error: impl Display) -> ControlResponse {
    Ack::err(error.to_string()).into()
}

impl ControlSurface {
    pub fn new(
        queue: Arc<QueueManager>,
        context: Arc<ProcessingContext>,
        workers: Arc<WorkerManager>,
        composer: Arc<MessageComposer>,
    ) -> Self {
        Self {
            queue,
            context,
            workers,
            composer,
        }
    }

    pub fn queue(&self) -> &Arc<QueueManager> {
        &self.queue
    }

    pub fn context(&self) -> &Arc<ProcessingContext> {
        &self.context
    }

    pub fn workers(&self) -> &Arc<WorkerManager> {
        &self.workers
    }

    /// 处理原始JSON消息
    ///
    /// 未知动作返回 `{ "error": "Unknown action" }`，已知动作但字段不合法时返回失败确认
    pub async fn dispatch_value(&self, message: Value) -> Value {
        let action = message
            .get("action")
            .and_then(Value::as_str)
            .map(str::to_string);

        let response = match serde_json::from_value::<ControlRequest>(message) {
            Ok(request) => self.dispatch(request).await,
            Err(e) => match action {
                Some(action) if ACTIONS.contains(&action.as_str()) => {
                    warn!("Malformed {} request: {}", action, e);
                    failure(e)
                }
                _ => ControlResponse::unknown_action(),
            },
        };

        serde_json::to_value(&response)
            .unwrap_or_else(|e| json!({ "success": false, "error": e.to_string() }))
    }

    /// 分派一个已解析的请求
    pub async fn dispatch(&self, request: ControlRequest) -> ControlResponse {
        debug!("Control request: {:?}", request);
        let owner = self.context.owner();
        let owner = owner.as_deref();

        match request {
            ControlRequest::AddToQueue { profile } => self.add_to_queue(owner, profile).await,
            ControlRequest::RemoveFromQueue { id } => {
                match self.queue.remove_entry(owner, &id).await {
                    Ok(()) => Ack::ok().into(),
                    Err(e) => failure(e),
                }
            }
            ControlRequest::RemoveByUrl { target_url } => {
                match self.queue.remove_by_url(owner, &target_url).await {
                    Ok(()) => Ack::ok().into(),
                    Err(e) => failure(e),
                }
            }
            ControlRequest::RetryItem { id } => match self.queue.retry_entry(owner, &id).await {
                Ok(()) => Ack::ok().into(),
                Err(e) => failure(e),
            },
            ControlRequest::GetStatus => self.status(owner).await,
            ControlRequest::GetSettings => match self.context.settings().await {
                Ok(settings) => ControlResponse::Settings(settings),
                Err(e) => failure(e),
            },
            ControlRequest::SetSettings { settings } => self.set_settings(settings).await,
            ControlRequest::Start => match self.workers.scheduler().start().await {
                Ok(()) => Ack::ok().into(),
                Err(e) => failure(e),
            },
            ControlRequest::Pause => match self.workers.scheduler().pause().await {
                Ok(()) => Ack::ok().into(),
                Err(e) => failure(e),
            },
            ControlRequest::ConnectNow => match self.workers.scheduler().connect_now().await {
                Ok(()) => Ack::ok().into(),
                Err(e) => failure(e),
            },
            ControlRequest::CheckConnectionsNow => match self.workers.reconcile_now().await {
                Ok(report) => Ack::with_count(report.identifiers.len()).into(),
                Err(e) => failure(e),
            },
            ControlRequest::IsInQueue { target_url } => {
                match self.queue.find_by_url(owner, &target_url).await {
                    Ok(entry) => ControlResponse::InQueue(InQueueResponse {
                        in_queue: entry
                            .as_ref()
                            .is_some_and(|entry| entry.status == EntryStatus::Pending),
                        status: entry.map(|entry| entry.status),
                    }),
                    Err(e) => failure(e),
                }
            }
            ControlRequest::SetUser { user } => match self.context.set_owner(&user) {
                Ok(user) => ControlResponse::User(UserResponse {
                    success: Some(true),
                    user: Some(user),
                }),
                Err(e) => failure(e),
            },
            ControlRequest::GetUser => ControlResponse::User(UserResponse {
                success: None,
                user: owner.map(str::to_string),
            }),
            ControlRequest::Clear => match self.queue.clear_pending(owner).await {
                Ok(_) => Ack::ok().into(),
                Err(e) => failure(e),
            },
            ControlRequest::GetAcceptedConnections => match self.accepted_connections().await {
                Ok(response) => ControlResponse::AcceptedConnections(response),
                Err(e) => failure(e),
            },
            ControlRequest::SendMessage {
                target_url,
                message,
            } => match self.composer.compose(&target_url, &message).await {
                Ok(()) => Ack::ok().into(),
                Err(e) => failure(e),
            },
        }
    }

    async fn add_to_queue(&self, owner: Option<&str>, profile: ProfileCandidate) -> ControlResponse {
        if let Err(e) = profile.validate() {
            return failure(format!("Invalid profile: {}", e));
        }
        match self.queue.add_entry(owner, profile).await {
            Ok(_) => Ack::ok().into(),
            Err(e) => failure(e),
        }
    }

    async fn status(&self, owner: Option<&str>) -> ControlResponse {
        let queue = match self.queue.list_entries(owner).await {
            Ok(queue) => queue,
            Err(e) => return failure(e),
        };
        match self.context.is_processing().await {
            Ok(is_processing) => ControlResponse::Status(StatusResponse::new(queue, is_processing)),
            Err(e) => failure(e),
        }
    }

    async fn set_settings(&self, settings: UserSettings) -> ControlResponse {
        if let Err(e) = self.context.save_settings(&settings).await {
            return failure(e);
        }
        self.workers
            .arm_reconciliation(settings.check_interval());
        Ack::ok().into()
    }

    async fn accepted_connections(&self) -> Result<AcceptedConnectionsResponse, StorageError> {
        let store = self.queue.store().as_ref();
        let accepted: AcceptedConnections = read_key(store, ACCEPTED_CONNECTIONS_KEY)
            .await?
            .unwrap_or_default();
        let last_check: Option<DateTime<Utc>> = read_key(store, LAST_CONNECTION_CHECK_KEY).await?;
        Ok(AcceptedConnectionsResponse {
            connections: accepted.usernames,
            last_check,
        })
    }
}
