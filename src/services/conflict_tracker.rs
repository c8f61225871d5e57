//! Merge-conflict polling.
//!
//! GitLab computes mergeability asynchronously after a merge request is
//! created, so the first read usually says `checking`. The tracker re-reads
//! the merge request (asking GitLab to recheck) at a fixed interval until the
//! status settles or the attempt budget runs out, then reports the last
//! snapshot exactly once.
//!
//! Each merge request has at most one live session. Starting a new one for
//! the same reference cancels the old one, and `stop` cancels without
//! reporting. Cancellation and delivery both go through the session registry
//! lock, and a finishing task only delivers if the registry still holds its
//! own session id, so a superseded or stopped session can never report.

use crate::error::AppError;
use crate::models::{GitLabMergeRequest, MergeRequestRef};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Delay between two polls of the same merge request.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Maximum number of polls per session.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

/// Where the tracker reads merge request state from.
#[async_trait]
pub trait MergeStatusSource: Send + Sync {
    /// Fetch the merge request, asking GitLab to recompute its merge status.
    async fn fetch_merge_status(
        &self,
        mr: MergeRequestRef,
    ) -> Result<GitLabMergeRequest, AppError>;
}

/// Polling cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    /// Values below 1 are treated as 1.
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Terminal result of a polling session.
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// GitLab finished computing mergeability.
    Resolved {
        merge_request: GitLabMergeRequest,
        attempts: u32,
    },

    /// The attempt budget ran out; this is the last snapshot seen, still unsettled.
    Exhausted {
        merge_request: GitLabMergeRequest,
        attempts: u32,
    },

    /// Polling stopped on an error.
    Failed {
        error: AppError,
        attempts: u32,
        last_seen: Option<GitLabMergeRequest>,
    },
}

impl PollOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Resolved { attempts, .. }
            | Self::Exhausted { attempts, .. }
            | Self::Failed { attempts, .. } => *attempts,
        }
    }

    /// The latest merge request snapshot, if any fetch succeeded.
    pub fn merge_request(&self) -> Option<&GitLabMergeRequest> {
        match self {
            Self::Resolved { merge_request, .. } | Self::Exhausted { merge_request, .. } => {
                Some(merge_request)
            }
            Self::Failed { last_seen, .. } => last_seen.as_ref(),
        }
    }
}

/// Interim report emitted after each unsettled attempt.
#[derive(Debug, Clone)]
pub struct PollProgress {
    pub mr: MergeRequestRef,
    pub attempt: u32,
    /// `None` when the attempt failed with a transient error.
    pub merge_request: Option<GitLabMergeRequest>,
}

/// Receiving end of one polling session.
#[derive(Debug)]
pub struct PollReceiver {
    mr: MergeRequestRef,
    rx: oneshot::Receiver<PollOutcome>,
}

impl PollReceiver {
    pub fn mr_ref(&self) -> MergeRequestRef {
        self.mr
    }

    /// Wait for the session to finish.
    ///
    /// Returns `None` if the session was stopped or superseded.
    pub async fn outcome(self) -> Option<PollOutcome> {
        self.rx.await.ok()
    }
}

struct Session {
    id: u64,
    task: JoinHandle<()>,
}

type Registry = Arc<Mutex<HashMap<MergeRequestRef, Session>>>;

fn lock(registry: &Mutex<HashMap<MergeRequestRef, Session>>) -> MutexGuard<'_, HashMap<MergeRequestRef, Session>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Tracks merge-conflict polling sessions, one per merge request.
///
/// Must be used from within a tokio runtime. Dropping the tracker cancels
/// every live session.
pub struct ConflictTracker {
    source: Arc<dyn MergeStatusSource>,
    config: PollConfig,
    sessions: Registry,
    next_id: AtomicU64,
    progress: Option<mpsc::UnboundedSender<PollProgress>>,
}

impl ConflictTracker {
    pub fn new(source: Arc<dyn MergeStatusSource>, config: PollConfig) -> Self {
        Self {
            source,
            config,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            progress: None,
        }
    }

    /// Emit a [`PollProgress`] on `tx` after every unsettled attempt.
    pub fn with_progress(mut self, tx: mpsc::UnboundedSender<PollProgress>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn config(&self) -> PollConfig {
        self.config
    }

    /// Start polling `mr`, cancelling any session already running for it.
    pub fn start(&self, mr: MergeRequestRef) -> PollReceiver {
        let (tx, rx) = oneshot::channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let poller = Poller {
            mr,
            id,
            source: Arc::clone(&self.source),
            config: self.config,
            sessions: Arc::clone(&self.sessions),
            progress: self.progress.clone(),
        };

        // Spawn and register under one lock so the task cannot look itself up
        // before it is registered.
        let mut sessions = lock(&self.sessions);
        let task = tokio::spawn(poller.run(tx));
        if let Some(previous) = sessions.insert(mr, Session { id, task }) {
            previous.task.abort();
            debug!(
                "Conflict check {} for {} superseded by {}",
                previous.id, mr, id
            );
        }
        info!("Started conflict check {} for {}", id, mr);

        PollReceiver { mr, rx }
    }

    /// Cancel the session for `mr`. Returns whether one was running.
    pub fn stop(&self, mr: MergeRequestRef) -> bool {
        match lock(&self.sessions).remove(&mr) {
            Some(session) => {
                session.task.abort();
                info!("Stopped conflict check {} for {}", session.id, mr);
                true
            }
            None => false,
        }
    }

    /// Cancel every session. Returns how many were running.
    pub fn stop_all(&self) -> usize {
        let drained: Vec<Session> = lock(&self.sessions).drain().map(|(_, s)| s).collect();
        for session in &drained {
            session.task.abort();
        }
        drained.len()
    }

    pub fn is_polling(&self, mr: MergeRequestRef) -> bool {
        lock(&self.sessions).contains_key(&mr)
    }

    pub fn active_sessions(&self) -> usize {
        lock(&self.sessions).len()
    }
}

impl Drop for ConflictTracker {
    fn drop(&mut self) {
        let cancelled = self.stop_all();
        if cancelled > 0 {
            debug!("Cancelled {} conflict checks on shutdown", cancelled);
        }
    }
}

/// The body of one polling session.
struct Poller {
    mr: MergeRequestRef,
    id: u64,
    source: Arc<dyn MergeStatusSource>,
    config: PollConfig,
    sessions: Registry,
    progress: Option<mpsc::UnboundedSender<PollProgress>>,
}

impl Poller {
    async fn run(self, tx: oneshot::Sender<PollOutcome>) {
        let outcome = self.poll_until_settled().await;

        let mut sessions = lock(&self.sessions);
        match sessions.get(&self.mr) {
            Some(session) if session.id == self.id => {
                sessions.remove(&self.mr);
            }
            _ => {
                debug!("Discarding result of stale conflict check {} for {}", self.id, self.mr);
                return;
            }
        }

        info!(
            "Conflict check {} for {} finished after {} attempt(s)",
            self.id,
            self.mr,
            outcome.attempts()
        );
        // Sent under the lock: a concurrent stop either ran before (and we
        // returned above) or observes an empty slot.
        if tx.send(outcome).is_err() {
            debug!("Nobody is waiting for conflict check {} for {}", self.id, self.mr);
        }
    }

    async fn poll_until_settled(&self) -> PollOutcome {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_seen: Option<GitLabMergeRequest> = None;
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.source.fetch_merge_status(self.mr).await {
                Ok(merge_request) if merge_request.is_merge_status_final() => {
                    return PollOutcome::Resolved {
                        merge_request,
                        attempts: attempt,
                    };
                }
                Ok(merge_request) => {
                    if attempt >= max_attempts {
                        warn!(
                            "Merge status of {} still unsettled after {} attempts",
                            self.mr, attempt
                        );
                        return PollOutcome::Exhausted {
                            merge_request,
                            attempts: attempt,
                        };
                    }
                    debug!("Merge status of {} unsettled (attempt {})", self.mr, attempt);
                    self.report(attempt, Some(merge_request.clone()));
                    last_seen = Some(merge_request);
                }
                Err(error) if error.is_transient() && attempt < max_attempts => {
                    warn!(
                        "Transient error polling {} (attempt {}): {}",
                        self.mr, attempt, error
                    );
                    self.report(attempt, None);
                }
                Err(error) => {
                    if error.is_transient() {
                        if let Some(merge_request) = last_seen.take() {
                            return PollOutcome::Exhausted {
                                merge_request,
                                attempts: attempt,
                            };
                        }
                    }
                    warn!("Conflict check for {} failed: {}", self.mr, error);
                    return PollOutcome::Failed {
                        error,
                        attempts: attempt,
                        last_seen,
                    };
                }
            }

            tokio::time::sleep(self.config.interval).await;
        }
    }

    /// Send interim progress, unless this session was stopped or superseded.
    fn report(&self, attempt: u32, merge_request: Option<GitLabMergeRequest>) {
        let Some(tx) = &self.progress else {
            return;
        };

        let sessions = lock(&self.sessions);
        if !matches!(sessions.get(&self.mr), Some(session) if session.id == self.id) {
            debug!("Dropping progress of stale conflict check {} for {}", self.id, self.mr);
            return;
        }
        let _ = tx.send(PollProgress {
            mr: self.mr,
            attempt,
            merge_request,
        });
    }
}
