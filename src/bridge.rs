//! Line-delimited JSON bridge between the UI and the services.
//!
//! Each input line is one `{type, message}` request. Each output line is
//! either a `response` envelope or a push (`gitlab:conflictStatusUpdate`,
//! `config:reloaded`). Requests are handled concurrently, so responses may
//! come back in a different order than the requests went in; the UI
//! matches them by `requestType`.
//!
//! The bridge runs until its input closes. Requests still in flight are
//! answered before it returns; running conflict checks are cancelled.

use crate::commands::{
    AppState, ConflictStatusPayload, InboundMessage, MessageRouter, OutboundMessage,
};
use crate::error::AppError;
use crate::services::{ConfigManager, ConflictTracker, PollConfig, PollProgress, SharedClient};
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

/// Request type reported for lines that are not valid requests.
const INVALID_REQUEST_TYPE: &str = "invalid";

/// Runtime settings for the bridge.
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// Directory holding `fast-merge-config.json`.
    pub storage_dir: PathBuf,

    /// Repository inspected by `gitlab:getCurrentRepo`.
    pub workspace: PathBuf,

    pub poll: PollConfig,

    /// Reload the config when the file changes on disk.
    pub watch_config: bool,
}

/// Serve requests from stdin, writing responses and pushes to stdout.
pub async fn run(options: BridgeOptions) -> Result<(), AppError> {
    serve(options, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Serve requests read from `input`, writing to `output`.
pub async fn serve<R, W>(options: BridgeOptions, input: R, output: W) -> Result<(), AppError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let manager = ConfigManager::new(&options.storage_dir);
    let config = match manager.load() {
        Ok(config) => config,
        Err(e) => {
            warn!("Using default config: {}", e);
            Default::default()
        }
    };

    let client = SharedClient::new(None);
    let (progress_tx, progress_rx) = mpsc::unbounded_channel();
    let tracker =
        ConflictTracker::new(Arc::new(client.clone()), options.poll).with_progress(progress_tx);

    let state = Arc::new(AppState::new(
        manager.clone(),
        client,
        tracker,
        options.workspace.clone(),
    ));
    state.apply_config(config).await;

    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_messages(output, out_rx));
    let router = MessageRouter::new(state.clone(), out_tx.clone());

    let mut background = vec![tokio::spawn(forward_progress(progress_rx, out_tx.clone()))];
    if options.watch_config {
        match spawn_config_reloader(&manager, state.clone(), out_tx.clone()) {
            Ok(task) => background.push(task),
            Err(e) => warn!("Config file watching disabled: {}", e),
        }
    }
    drop(out_tx);

    info!(
        "fast-merge bridge ready (config: {})",
        manager.config_path().display()
    );

    let mut in_flight = JoinSet::new();
    let mut lines = BufReader::new(input).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<InboundMessage>(line) {
            Ok(request) => {
                let router = router.clone();
                in_flight.spawn(async move {
                    let response = router.handle(request).await;
                    router.push(response);
                });
            }
            Err(e) => {
                warn!("Ignoring malformed request: {}", e);
                router.push(OutboundMessage::failure(
                    INVALID_REQUEST_TYPE,
                    format!("Invalid message: {}", e),
                ));
            }
        }
    }

    debug!("Input closed, finishing {} request(s)", in_flight.len());
    while let Some(result) = in_flight.join_next().await {
        if let Err(e) = result {
            error!("Request handler panicked: {}", e);
        }
    }

    let cancelled = state.tracker.stop_all();
    if cancelled > 0 {
        info!("Cancelled {} conflict check(s)", cancelled);
    }
    for task in background {
        task.abort();
    }
    drop(router);
    drop(state);

    writer
        .await
        .map_err(|e| AppError::internal(format!("Output task failed: {}", e)))?
}

/// Write each outbound message as one JSON line.
async fn write_messages<W>(
    mut output: W,
    mut rx: mpsc::UnboundedReceiver<OutboundMessage>,
) -> Result<(), AppError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let mut line = serde_json::to_vec(&message)?;
        line.push(b'\n');
        output.write_all(&line).await?;
        output.flush().await?;
    }
    Ok(())
}

/// Turn tracker progress into `checking` pushes.
async fn forward_progress(
    mut progress: mpsc::UnboundedReceiver<PollProgress>,
    out: mpsc::UnboundedSender<OutboundMessage>,
) {
    while let Some(update) = progress.recv().await {
        let push = OutboundMessage::ConflictStatusUpdate(ConflictStatusPayload::from_progress(update));
        if out.send(push).is_err() {
            break;
        }
    }
}

/// Apply config file edits as they happen.
fn spawn_config_reloader(
    manager: &ConfigManager,
    state: Arc<AppState>,
    out: mpsc::UnboundedSender<OutboundMessage>,
) -> Result<JoinHandle<()>, AppError> {
    let mut watcher = manager.watch()?;

    Ok(tokio::spawn(async move {
        while let Some(config) = watcher.changed().await {
            let Some(validation) = state.apply_if_changed(config).await else {
                debug!("Config file change matches active settings");
                continue;
            };
            info!("Applied config change (valid: {})", validation.valid);
            if out.send(OutboundMessage::ConfigReloaded(validation)).is_err() {
                break;
            }
        }
    }))
}
