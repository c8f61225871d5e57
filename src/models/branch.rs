//! GitLab branch model.

use super::commit::GitLabCommit;
use serde::{Deserialize, Serialize};

/// GitLab repository branch from API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitLabBranch {
    pub name: String,

    #[serde(default)]
    pub merged: bool,

    #[serde(default)]
    pub protected: bool,

    /// Whether this is the project's default branch.
    #[serde(default)]
    pub default: bool,

    #[serde(default)]
    pub developers_can_push: bool,

    #[serde(default)]
    pub developers_can_merge: bool,

    #[serde(default)]
    pub can_push: bool,

    pub web_url: Option<String>,

    /// Head commit of the branch.
    pub commit: Option<GitLabCommit>,
}
