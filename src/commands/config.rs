//! Config file request handlers.

use super::{output, MessageRouter};
use crate::error::AppError;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Result of `config:getInfo`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInfo {
    pub path: String,
    pub base_url: String,
    pub has_token: bool,
    pub project_id: Option<i64>,
    pub valid: bool,
    pub errors: Vec<String>,
}

/// `config:open`: make sure the file exists and tell the UI where it is.
pub async fn open(router: &MessageRouter) -> Result<Value, AppError> {
    let manager = &router.state().config;
    manager.ensure_exists()?;
    Ok(json!({ "path": manager.config_path().display().to_string() }))
}

/// `config:reload`: re-read the file and reconfigure the client.
pub async fn reload(router: &MessageRouter) -> Result<Value, AppError> {
    let state = router.state();
    let config = state.config.load()?;
    let validation = state.apply_config(config).await;
    info!("Config reloaded (valid: {})", validation.valid);
    output(&validation)
}

/// `config:check`: validate the active settings and, when they look
/// right, confirm GitLab accepts them.
pub async fn check(router: &MessageRouter) -> Result<Value, AppError> {
    let state = router.state();
    let mut validation = state.settings().await.validate();

    if validation.valid {
        let client = state.client.get().await?;
        if let Err(e) = client.test_connection().await {
            warn!("GitLab connection check failed: {}", e);
            validation.valid = false;
            validation
                .errors
                .push(format!("GitLab connection failed: {}", e));
        }
    }

    output(&validation)
}

/// `config:getInfo`: summary of the active settings, without the token.
pub async fn get_info(router: &MessageRouter) -> Result<Value, AppError> {
    let state = router.state();
    let settings = state.settings().await;
    let validation = settings.validate();

    output(&ConfigInfo {
        path: state.config.config_path().display().to_string(),
        base_url: settings.gitlab.base_url,
        has_token: !settings.gitlab.token.trim().is_empty(),
        project_id: settings.gitlab.project_id,
        valid: validation.valid,
        errors: validation.errors,
    })
}
