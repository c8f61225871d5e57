//! GitLab project model.

use serde::{Deserialize, Serialize};

/// Namespace (group or user) owning a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitLabNamespace {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub kind: String,
    pub full_path: String,
}

/// GitLab project from API.
///
/// Requested with `simple=true`, so only the lightweight fields are
/// guaranteed; the rest are optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitLabProject {
    /// GitLab project ID.
    pub id: i64,

    /// Short project name (e.g., "GitLab").
    pub name: String,

    /// Full namespaced name (e.g., "GitLab.org / GitLab").
    pub name_with_namespace: String,

    /// Project path (e.g., "gitlab").
    pub path: String,

    /// Path with namespace (e.g., "gitlab-org/gitlab").
    pub path_with_namespace: String,

    pub description: Option<String>,

    /// Web URL for the project.
    pub web_url: String,

    pub ssh_url_to_repo: Option<String>,
    pub http_url_to_repo: Option<String>,

    /// Default branch; absent for empty repositories.
    pub default_branch: Option<String>,

    pub namespace: Option<GitLabNamespace>,
}
