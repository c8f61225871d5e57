//! Local git repository model.

use super::project::GitLabProject;
use serde::{Deserialize, Serialize};

/// Information about the git repository in the current workspace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitRepository {
    pub workspace_folder: String,
    pub remote_url: String,
    pub current_branch: String,
    pub is_git_repository: bool,

    /// Project path parsed from the `origin` remote (e.g., "group/project").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gitlab_project_path: Option<String>,

    /// Base URL parsed from the `origin` remote (e.g., `https://gitlab.com`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gitlab_base_url: Option<String>,

    /// The GitLab project the remote resolves to, when it could be looked up.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<GitLabProject>,
}
