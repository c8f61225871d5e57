//! Cherry-pick request and result models.

use super::commit::GitLabCommit;
use super::merge_request::GitLabMergeRequest;
use serde::{Deserialize, Serialize};

/// What to cherry-pick and where.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CherryPickOptions {
    /// Commit SHAs to apply.
    pub commits: Vec<String>,

    /// Branches to open one merge request against each.
    pub target_branches: Vec<String>,

    /// Prefix for the generated title (default "Cherry-pick").
    pub title_prefix: Option<String>,

    /// Full title; overrides the generated one.
    pub title: Option<String>,

    pub description: Option<String>,

    /// Commit metadata from the UI, used to apply commits oldest first.
    pub commit_details: Option<Vec<GitLabCommit>>,
}

/// Per-target-branch outcome of a cherry-pick request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CherryPickResult {
    pub target_branch: String,
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_request: Option<GitLabMergeRequest>,

    /// Temporary branch hosting the picked commits. Only set when it still exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_branch_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
