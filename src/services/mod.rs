//! Business logic services.
//!
//! This module contains the GitLab client, the conflict-check tracker, the
//! cherry-pick workflow, config file handling and local git inspection.
//!
//! Services are independent of the message bridge and testable on their own.

pub mod cherry_pick;
pub mod config_manager;
pub mod conflict_tracker;
pub mod git_repo;
pub mod gitlab_client;

pub use config_manager::{ConfigManager, ConfigValidation, ConfigWatcher, FastMergeConfig};
pub use conflict_tracker::{ConflictTracker, MergeStatusSource, PollConfig, PollOutcome, PollProgress};
pub use gitlab_client::{GitLabClient, GitLabClientConfig, SharedClient};
