//! GitLab request handlers.
//!
//! Each handler decodes its payload, calls the GitLab client and returns
//! the JSON the UI expects. Merge requests created here are handed to the
//! conflict tracker so the UI learns when GitLab has checked them.

use super::{input, output, MessageRouter};
use crate::error::AppError;
use crate::models::{
    CherryPickOptions, GitLabMergeRequest, GitLabProject, GitRepository, MergeRequestOptions,
    MergeRequestRef, MergeResult,
};
use crate::services::{cherry_pick, git_repo, GitLabClient};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_PER_PAGE: u32 = 20;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetProjectsInput {
    search: Option<String>,
    page: Option<u32>,
    per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetBranchesInput {
    project_id: i64,
    search: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetCommitsInput {
    project_id: i64,
    branch: String,
    search: Option<String>,
    page: Option<u32>,
    per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateMergeRequestInput {
    project_id: i64,
    options: MergeRequestOptions,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCherryPickInput {
    project_id: i64,
    options: CherryPickOptions,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CloseMergeRequestInput {
    project_id: i64,
    merge_request_iid: i64,
    temp_branch_name: Option<String>,
}

/// Result of `gitlab:closeMergeRequest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseMergeRequestResult {
    pub closed: bool,
    pub branch_deleted: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_request: Option<GitLabMergeRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetConfigurationInput {
    base_url: String,
    token: String,
    project_id: Option<i64>,
}

/// `gitlab:getProjects`
pub async fn get_projects(router: &MessageRouter, payload: Value) -> Result<Value, AppError> {
    let query: GetProjectsInput = input(payload)?;
    let client = router.state().client.get().await?;

    let projects = client
        .get_projects(
            query.search.as_deref(),
            query.page.unwrap_or(DEFAULT_PAGE),
            query.per_page.unwrap_or(DEFAULT_PER_PAGE),
        )
        .await?;
    output(&projects)
}

/// `gitlab:getBranches`
pub async fn get_branches(router: &MessageRouter, payload: Value) -> Result<Value, AppError> {
    let query: GetBranchesInput = input(payload)?;
    let client = router.state().client.get().await?;

    let branches = client
        .list_branches(query.project_id, query.search.as_deref())
        .await?;
    output(&branches)
}

/// `gitlab:getCommits`
///
/// With a search keyword, commits are matched by message and, when the
/// keyword looks like a SHA, by id.
pub async fn get_commits(router: &MessageRouter, payload: Value) -> Result<Value, AppError> {
    let query: GetCommitsInput = input(payload)?;
    if query.branch.trim().is_empty() {
        return Err(AppError::invalid_input_field("Branch is required", "branch"));
    }
    let client = router.state().client.get().await?;
    let page = query.page.unwrap_or(DEFAULT_PAGE);
    let per_page = query.per_page.unwrap_or(DEFAULT_PER_PAGE);

    let commits = match query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(keyword) => {
            client
                .search_commits(query.project_id, &query.branch, keyword, page, per_page)
                .await?
        }
        None => {
            client
                .list_commits(query.project_id, &query.branch, None, page, per_page)
                .await?
        }
    };
    output(&commits)
}

/// `gitlab:createMergeRequest`
///
/// API rejections are reported inside the `MergeResult`, not as a failed
/// response. Unset merge options fall back to the config file defaults.
pub async fn create_merge_request(
    router: &MessageRouter,
    payload: Value,
) -> Result<Value, AppError> {
    let CreateMergeRequestInput {
        project_id,
        mut options,
    } = input(payload)?;
    let client = router.state().client.get().await?;

    let defaults = router.state().settings().await.merge;
    options
        .remove_source_branch
        .get_or_insert(defaults.remove_source_branch);
    options.squash.get_or_insert(defaults.squash);

    let result = match client.create_merge_request(project_id, &options).await {
        Ok(merge_request) => {
            info!(
                "Created merge request !{} ({} -> {})",
                merge_request.iid, merge_request.source_branch, merge_request.target_branch
            );
            router.watch_conflicts(&merge_request);
            MergeResult {
                success: true,
                message: Some(format!("Merge request created: {}", merge_request.title)),
                merge_request: Some(merge_request),
                error: None,
            }
        }
        Err(e) => {
            warn!("Failed to create merge request: {}", e);
            MergeResult {
                success: false,
                merge_request: None,
                message: Some(format!("Failed to create merge request: {}", e)),
                error: Some(e.to_string()),
            }
        }
    };
    output(&result)
}

/// `gitlab:createCherryPickMR`
pub async fn create_cherry_pick_mr(
    router: &MessageRouter,
    payload: Value,
) -> Result<Value, AppError> {
    let CreateCherryPickInput {
        project_id,
        options,
    } = input(payload)?;
    let client = router.state().client.get().await?;

    let results =
        cherry_pick::create_cherry_pick_merge_requests(&client, project_id, &options).await?;

    for merge_request in results.iter().filter_map(|r| r.merge_request.as_ref()) {
        router.watch_conflicts(merge_request);
    }
    output(&results)
}

/// `gitlab:closeMergeRequest`
///
/// Stops any running conflict check, closes the merge request and then
/// deletes the temporary cherry-pick branch if one is named. A failed
/// branch deletion is reported as `branchDeleted: false`.
pub async fn close_merge_request(
    router: &MessageRouter,
    payload: Value,
) -> Result<Value, AppError> {
    let request: CloseMergeRequestInput = input(payload)?;

    let mr = MergeRequestRef::new(request.project_id, request.merge_request_iid);
    if router.state().tracker.stop(mr) {
        debug!("Stopped conflict check for {}", mr);
    }

    let client = router.state().client.get().await?;

    let merge_request = client
        .close_merge_request(mr.project_id, mr.mr_iid)
        .await?;
    info!("Closed merge request {}", mr);

    let branch_deleted = match request.temp_branch_name.as_deref().filter(|b| !b.is_empty()) {
        Some(branch) => match client.delete_branch(mr.project_id, branch).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to delete temporary branch {}: {}", branch, e);
                false
            }
        },
        None => false,
    };

    output(&CloseMergeRequestResult {
        closed: true,
        branch_deleted,
        merge_request: Some(merge_request),
    })
}

/// `gitlab:getCurrentRepo`
///
/// The GitLab project is resolved from the `origin` remote, falling back
/// to the `projectId` from the config file. Lookup failures leave
/// `project` unset rather than failing the request.
pub async fn get_current_repo(router: &MessageRouter) -> Result<Value, AppError> {
    let state = router.state();
    let mut repo = git_repo::repository_info(&state.workspace).await;

    if let Ok(client) = state.client.get().await {
        let fallback_id = state.settings().await.gitlab.project_id;
        repo.project = resolve_project(&client, &repo, fallback_id).await;
    }

    output(&repo)
}

async fn resolve_project(
    client: &GitLabClient,
    repo: &GitRepository,
    fallback_id: Option<i64>,
) -> Option<GitLabProject> {
    if let Some(path) = repo.gitlab_project_path.as_deref() {
        match client.get_project_by_path(path).await {
            Ok(Some(project)) => return Some(project),
            Ok(None) => debug!("No GitLab project at {}", path),
            Err(e) => warn!("Failed to look up project {}: {}", path, e),
        }
    }

    let id = fallback_id?;
    match client.get_project(id).await {
        Ok(project) => Some(project),
        Err(e) => {
            warn!("Failed to look up project {}: {}", id, e);
            None
        }
    }
}

/// `gitlab:setConfiguration`
///
/// Writes the GitLab settings to the config file and reconfigures the
/// client. The file is written even when validation fails, so the user
/// can finish editing it later.
pub async fn set_configuration(router: &MessageRouter, payload: Value) -> Result<Value, AppError> {
    let request: SetConfigurationInput = input(payload)?;
    let state = router.state();

    let mut config = match state.config.load() {
        Ok(config) => config,
        Err(e) => {
            warn!("Replacing unreadable config file: {}", e);
            Default::default()
        }
    };
    config.gitlab.base_url = request.base_url.trim().to_string();
    config.gitlab.token = request.token.trim().to_string();
    config.gitlab.project_id = request.project_id;

    state.config.save(&config)?;
    let validation = state.apply_config(config).await;
    output(&validation)
}
