//! Data models for the application.
//!
//! These models mirror the GitLab REST v4 resources the UI works with, plus
//! the request/result shapes exchanged over the message bridge.
//!
//! API resources derive both Serialize and Deserialize: they are read from
//! GitLab and forwarded unchanged to the frontend.

pub mod branch;
pub mod cherry_pick;
pub mod commit;
pub mod merge_request;
pub mod project;
pub mod repository;

// Re-exports for convenient access
pub use branch::GitLabBranch;
pub use cherry_pick::{CherryPickOptions, CherryPickResult};
pub use commit::{CommitStats, GitLabCommit};
pub use merge_request::{
    AcceptMergeRequestOptions, DetailedMergeStatus, GitLabMergeRequest, GitLabUser, MergeRequestOptions,
    MergeRequestRef, MergeRequestState, MergeResult, MergeStatus,
};
pub use project::{GitLabNamespace, GitLabProject};
pub use repository::GitRepository;
