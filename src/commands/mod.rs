//! Message handlers for the UI bridge.
//!
//! The UI sends `{ "type": ..., "message": ... }` requests and gets exactly
//! one `response` envelope back for each. Conflict-check results are pushed
//! separately as `gitlab:conflictStatusUpdate` messages once GitLab has
//! finished computing mergeability.
//!
//! Handlers are organized by functionality:
//! - `gitlab`: projects, branches, commits and merge requests
//! - `config`: config file access and validation

pub mod config;
pub mod gitlab;

use crate::error::AppError;
use crate::models::{GitLabMergeRequest, MergeRequestRef};
use crate::services::{
    ConfigManager, ConfigValidation, ConflictTracker, FastMergeConfig, PollOutcome, PollProgress,
    SharedClient,
};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// A request from the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub message: Value,
}

impl InboundMessage {
    pub fn new(kind: impl Into<String>, message: Value) -> Self {
        Self {
            kind: kind.into(),
            message,
        }
    }
}

/// Anything sent to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum OutboundMessage {
    #[serde(rename = "response")]
    Response(ResponseBody),

    #[serde(rename = "gitlab:conflictStatusUpdate")]
    ConflictStatusUpdate(ConflictStatusPayload),

    /// The config file changed on disk and was applied.
    #[serde(rename = "config:reloaded")]
    ConfigReloaded(ConfigValidation),
}

impl OutboundMessage {
    pub fn success(request_type: impl Into<String>, data: Value) -> Self {
        Self::Response(ResponseBody {
            request_type: request_type.into(),
            success: true,
            data: Some(data),
            error: None,
        })
    }

    pub fn failure(request_type: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Response(ResponseBody {
            request_type: request_type.into(),
            success: false,
            data: None,
            error: Some(error.into()),
        })
    }
}

/// Body of a `response` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBody {
    pub request_type: String,
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Phase reported in a conflict status push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictCheckStatus {
    Checking,
    Completed,
    Failed,
}

/// Body of a `gitlab:conflictStatusUpdate` push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictStatusPayload {
    pub project_id: i64,
    pub merge_request_iid: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_request: Option<GitLabMergeRequest>,

    pub conflict_check_status: ConflictCheckStatus,
    pub attempt: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConflictStatusPayload {
    /// Interim "still checking" update.
    pub fn from_progress(progress: PollProgress) -> Self {
        Self {
            project_id: progress.mr.project_id,
            merge_request_iid: progress.mr.mr_iid,
            merge_request: progress.merge_request,
            conflict_check_status: ConflictCheckStatus::Checking,
            attempt: progress.attempt,
            error: None,
        }
    }

    /// Final update for a finished session.
    ///
    /// An exhausted budget still counts as completed: the UI gets the last
    /// snapshot and can show whatever status it carries.
    pub fn from_outcome(mr: MergeRequestRef, outcome: PollOutcome) -> Self {
        let attempt = outcome.attempts();
        let (status, merge_request, error) = match outcome {
            PollOutcome::Resolved { merge_request, .. }
            | PollOutcome::Exhausted { merge_request, .. } => {
                (ConflictCheckStatus::Completed, Some(merge_request), None)
            }
            PollOutcome::Failed {
                error, last_seen, ..
            } => (ConflictCheckStatus::Failed, last_seen, Some(error.to_string())),
        };

        Self {
            project_id: mr.project_id,
            merge_request_iid: mr.mr_iid,
            merge_request,
            conflict_check_status: status,
            attempt,
            error,
        }
    }
}

/// Everything the handlers share.
pub struct AppState {
    pub config: ConfigManager,
    pub client: SharedClient,
    pub tracker: ConflictTracker,

    /// Directory inspected by `gitlab:getCurrentRepo`.
    pub workspace: PathBuf,

    settings: RwLock<FastMergeConfig>,
}

impl AppState {
    pub fn new(
        config: ConfigManager,
        client: SharedClient,
        tracker: ConflictTracker,
        workspace: PathBuf,
    ) -> Self {
        Self {
            config,
            client,
            tracker,
            workspace,
            settings: RwLock::new(FastMergeConfig::default()),
        }
    }

    /// Snapshot of the active settings.
    pub async fn settings(&self) -> FastMergeConfig {
        self.settings.read().await.clone()
    }

    /// Make `config` the active settings and rebuild the API client.
    ///
    /// An invalid config leaves the bridge without a client, so API
    /// requests fail with a configuration error until it is fixed.
    pub async fn apply_config(&self, config: FastMergeConfig) -> ConfigValidation {
        let validation = config.validate();
        match config.build_client() {
            Ok(Some(client)) => {
                info!("GitLab client configured for {}", config.gitlab.base_url);
                self.client.install(client).await;
            }
            Ok(None) => {
                info!("GitLab is not configured: {}", validation.errors.join("; "));
                self.client.clear(validation.errors.clone()).await;
            }
            Err(e) => {
                warn!("Failed to build GitLab client: {}", e);
                self.client.clear(vec![e.to_string()]).await;
            }
        }

        *self.settings.write().await = config;
        validation
    }

    /// Apply `config` unless it matches the active settings.
    ///
    /// Saves made by `gitlab:setConfiguration` come back through the file
    /// watcher; those are already applied and return `None`.
    pub async fn apply_if_changed(&self, config: FastMergeConfig) -> Option<ConfigValidation> {
        if *self.settings.read().await == config {
            return None;
        }
        Some(self.apply_config(config).await)
    }
}

/// Dispatches UI requests to handlers.
#[derive(Clone)]
pub struct MessageRouter {
    state: Arc<AppState>,
    outbound: mpsc::UnboundedSender<OutboundMessage>,
}

impl MessageRouter {
    /// Route requests against `state`; pushes go to `outbound`.
    pub fn new(state: Arc<AppState>, outbound: mpsc::UnboundedSender<OutboundMessage>) -> Self {
        Self { state, outbound }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Handle one request and build its response envelope.
    ///
    /// Never fails: errors become `success: false` responses.
    pub async fn handle(&self, request: InboundMessage) -> OutboundMessage {
        let InboundMessage { kind, message } = request;
        debug!("Handling {}", kind);

        let result = match kind.as_str() {
            "gitlab:getProjects" => gitlab::get_projects(self, message).await,
            "gitlab:getBranches" => gitlab::get_branches(self, message).await,
            "gitlab:getCommits" => gitlab::get_commits(self, message).await,
            "gitlab:createMergeRequest" => gitlab::create_merge_request(self, message).await,
            "gitlab:createCherryPickMR" => gitlab::create_cherry_pick_mr(self, message).await,
            "gitlab:closeMergeRequest" => gitlab::close_merge_request(self, message).await,
            "gitlab:getCurrentRepo" => gitlab::get_current_repo(self).await,
            "gitlab:setConfiguration" => gitlab::set_configuration(self, message).await,
            "config:open" => config::open(self).await,
            "config:reload" => config::reload(self).await,
            "config:check" => config::check(self).await,
            "config:getInfo" => config::get_info(self).await,
            _ => {
                warn!("Unknown message type: {}", kind);
                let error = format!("Unknown message type: {}", kind);
                return OutboundMessage::failure(kind, error);
            }
        };

        match result {
            Ok(data) => OutboundMessage::success(kind, data),
            Err(e) => {
                warn!("{} failed: {}", kind, e);
                OutboundMessage::failure(kind, e.to_string())
            }
        }
    }

    /// Send a message to the UI outside the request/response cycle.
    pub fn push(&self, message: OutboundMessage) {
        if self.outbound.send(message).is_err() {
            debug!("Outbound channel closed, dropping push");
        }
    }

    /// Poll `merge_request` until its conflict status settles, then push
    /// the result. Restarts any check already running for it.
    pub fn watch_conflicts(&self, merge_request: &GitLabMergeRequest) {
        let receiver = self.state.tracker.start(merge_request.reference());
        let router = self.clone();

        tokio::spawn(async move {
            let mr = receiver.mr_ref();
            match receiver.outcome().await {
                Some(outcome) => {
                    router.push(OutboundMessage::ConflictStatusUpdate(
                        ConflictStatusPayload::from_outcome(mr, outcome),
                    ));
                }
                None => debug!("Conflict check for {} was cancelled", mr),
            }
        });
    }
}

/// Decode a request payload. A missing payload reads as `{}`.
pub(crate) fn input<T: DeserializeOwned>(payload: Value) -> Result<T, AppError> {
    let payload = if payload.is_null() {
        Value::Object(Default::default())
    } else {
        payload
    };
    serde_json::from_value(payload)
        .map_err(|e| AppError::invalid_input(format!("Invalid message payload: {}", e)))
}

/// Encode handler output for the response envelope.
pub(crate) fn output<T: Serialize>(data: &T) -> Result<Value, AppError> {
    Ok(serde_json::to_value(data)?)
}
