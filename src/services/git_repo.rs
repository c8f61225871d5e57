//! Local git repository inspection.
//!
//! Answers which branch the workspace is on and which GitLab project its
//! `origin` remote points to, by shelling out to `git`.

use crate::error::AppError;
use crate::models::GitRepository;
use log::debug;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tokio::process::Command;

/// `ssh://[user@]host[:port]/group/project.git`.
static SSH_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ssh://(?:[^@/\s]+@)?([^:/\s]+)(?::\d+)?/(.+?)(?:\.git)?/?$")
        .expect("Invalid ssh url regex")
});

/// scp-style `git@host:group/project.git`. Everything after the colon is
/// the path; this form has no port.
static SCP_REMOTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@/\s]+@([^:/\s]+):(.+?)(?:\.git)?/?$").expect("Invalid scp remote regex")
});

/// `http(s)://[user@]host[:port]/group/project.git`.
static HTTP_REMOTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?)://(?:[^@/\s]+@)?([^/\s]+)/(.+?)(?:\.git)?/?$")
        .expect("Invalid http remote regex")
});

/// GitLab location parsed from a remote URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteInfo {
    /// Web base URL, e.g. `https://gitlab.com`.
    pub base_url: String,
    /// Namespace path, e.g. `group/subgroup/project`.
    pub project_path: String,
}

/// Parse a git remote URL into the GitLab server and project path.
///
/// SSH remotes map to `https://<host>`; HTTP remotes keep their scheme
/// and port. Returns `None` for anything else.
pub fn parse_gitlab_remote(remote_url: &str) -> Option<RemoteInfo> {
    let url = remote_url.trim();

    if let Some(caps) = HTTP_REMOTE_RE.captures(url) {
        return Some(RemoteInfo {
            base_url: format!("{}://{}", &caps[1], &caps[2]),
            project_path: caps[3].to_string(),
        });
    }

    if let Some(caps) = SSH_URL_RE
        .captures(url)
        .or_else(|| SCP_REMOTE_RE.captures(url))
    {
        return Some(RemoteInfo {
            base_url: format!("https://{}", &caps[1]),
            project_path: caps[2].to_string(),
        });
    }

    None
}

/// Run `git` in `workspace` and return trimmed stdout.
async fn git(workspace: &Path, args: &[&str]) -> Result<String, AppError> {
    let output = Command::new("git")
        .arg("-C")
        .arg(workspace)
        .args(args)
        .output()
        .await
        .map_err(|e| AppError::io(format!("Failed to run git: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AppError::io(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Whether `workspace` is inside a git work tree.
pub async fn is_git_repository(workspace: &Path) -> bool {
    git(workspace, &["rev-parse", "--git-dir"]).await.is_ok()
}

/// Current branch name. Empty on a detached HEAD.
pub async fn current_branch(workspace: &Path) -> Result<String, AppError> {
    git(workspace, &["branch", "--show-current"]).await
}

/// URL of the `origin` remote.
pub async fn remote_url(workspace: &Path) -> Result<String, AppError> {
    git(workspace, &["remote", "get-url", "origin"]).await
}

/// Describe the repository in `workspace`.
///
/// Never fails: a directory that is not a repository yields
/// `is_git_repository: false`, and a missing branch or remote yields empty
/// fields. The `project` field is left for the caller to resolve.
pub async fn repository_info(workspace: &Path) -> GitRepository {
    let mut repo = GitRepository {
        workspace_folder: workspace.display().to_string(),
        ..Default::default()
    };

    if !is_git_repository(workspace).await {
        debug!("{} is not a git repository", workspace.display());
        return repo;
    }
    repo.is_git_repository = true;

    match current_branch(workspace).await {
        Ok(branch) => repo.current_branch = branch,
        Err(e) => debug!("Could not read current branch: {}", e),
    }

    match remote_url(workspace).await {
        Ok(url) => {
            if let Some(remote) = parse_gitlab_remote(&url) {
                repo.gitlab_base_url = Some(remote.base_url);
                repo.gitlab_project_path = Some(remote.project_path);
            }
            repo.remote_url = url;
        }
        Err(e) => debug!("Could not read origin remote: {}", e),
    }

    repo
}
