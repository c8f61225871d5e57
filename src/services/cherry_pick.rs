//! Cherry-pick merge request orchestration.
//!
//! For every target branch a temporary branch is cut from the target, the
//! selected commits are cherry-picked onto it one by one, and a merge request
//! is opened from the temporary branch back into the target. Target branches
//! are processed concurrently; commits within a branch are applied in order.
//! A branch that fails after its temporary branch exists gets that branch
//! deleted (best effort) before the failure is reported.

use crate::error::AppError;
use crate::models::commit::short_sha;
use crate::models::{CherryPickOptions, CherryPickResult, GitLabMergeRequest, MergeRequestOptions};
use crate::services::gitlab_client::GitLabClient;
use chrono::Utc;
use futures::future::join_all;
use log::{info, warn};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::HashMap;

const DEFAULT_TITLE_PREFIX: &str = "Cherry-pick";

/// Cherry-pick `options.commits` onto each of `options.target_branches`.
///
/// Returns one result per target branch, in the order the branches were
/// given. Per-branch failures are reported in the results; only invalid
/// input fails the whole call.
pub async fn create_cherry_pick_merge_requests(
    client: &GitLabClient,
    project_id: i64,
    options: &CherryPickOptions,
) -> Result<Vec<CherryPickResult>, AppError> {
    if options.commits.is_empty() {
        return Err(AppError::invalid_input_field(
            "At least one commit is required",
            "commits",
        ));
    }
    if options.target_branches.is_empty() {
        return Err(AppError::invalid_input_field(
            "At least one target branch is required",
            "target_branches",
        ));
    }

    let commits = ordered_commits(options);
    info!(
        "Cherry-picking {} commit(s) onto {} branch(es) in project {}",
        commits.len(),
        options.target_branches.len(),
        project_id
    );

    let jobs = options
        .target_branches
        .iter()
        .map(|target| cherry_pick_onto(client, project_id, target, &commits, options));

    Ok(join_all(jobs).await)
}

/// Order in which commits are applied.
///
/// When the UI supplied commit details covering every selected SHA with a
/// parseable `committed_date`, commits are applied oldest first. Otherwise
/// the selection order is kept as is.
pub fn ordered_commits(options: &CherryPickOptions) -> Vec<String> {
    let details = match options.commit_details.as_deref() {
        Some(details) if !details.is_empty() => details,
        _ => return options.commits.clone(),
    };

    let dates: HashMap<&str, _> = details
        .iter()
        .filter_map(|c| c.committed_at().map(|at| (c.id.as_str(), at)))
        .collect();

    let mut keyed = Vec::with_capacity(options.commits.len());
    for sha in &options.commits {
        match dates.get(sha.as_str()) {
            Some(at) => keyed.push((*at, sha.clone())),
            None => return options.commits.clone(),
        }
    }

    // Stable: commits with equal timestamps keep their selection order.
    keyed.sort_by_key(|(at, _)| *at);
    keyed.into_iter().map(|(_, sha)| sha).collect()
}

/// Name for the temporary branch hosting commits bound for `target`.
pub fn temp_branch_name(target: &str) -> String {
    let sanitized: String = target
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect();

    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect::<String>()
        .to_lowercase();

    format!(
        "cherry-pick-{}-{}-{}",
        sanitized,
        Utc::now().timestamp_millis(),
        suffix
    )
}

fn merge_request_title(options: &CherryPickOptions, commits: &[String], target: &str) -> String {
    if let Some(title) = options.title.as_deref().filter(|t| !t.trim().is_empty()) {
        return title.to_string();
    }

    let prefix = options
        .title_prefix
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or(DEFAULT_TITLE_PREFIX);
    let shas: Vec<&str> = commits.iter().map(|sha| short_sha(sha)).collect();

    format!("{}: {} to {}", prefix, shas.join(", "), target)
}

async fn cherry_pick_onto(
    client: &GitLabClient,
    project_id: i64,
    target: &str,
    commits: &[String],
    options: &CherryPickOptions,
) -> CherryPickResult {
    let temp_branch = temp_branch_name(target);

    if let Err(e) = client.create_branch(project_id, &temp_branch, target).await {
        warn!("Could not create temporary branch for {}: {}", target, e);
        return failure(target, e);
    }

    match apply_and_open(client, project_id, target, &temp_branch, commits, options).await {
        Ok(merge_request) => {
            info!(
                "Opened cherry-pick merge request !{} into {}",
                merge_request.iid, target
            );
            CherryPickResult {
                target_branch: target.to_string(),
                success: true,
                message: Some(format!(
                    "Merge request !{} created for {}",
                    merge_request.iid, target
                )),
                merge_request: Some(merge_request),
                temp_branch_name: Some(temp_branch),
                error: None,
            }
        }
        Err(e) => {
            warn!("Cherry-pick onto {} failed: {}", target, e);
            if let Err(cleanup) = client.delete_branch(project_id, &temp_branch).await {
                warn!(
                    "Failed to delete temporary branch {}: {}",
                    temp_branch, cleanup
                );
            }
            failure(target, e)
        }
    }
}

async fn apply_and_open(
    client: &GitLabClient,
    project_id: i64,
    target: &str,
    temp_branch: &str,
    commits: &[String],
    options: &CherryPickOptions,
) -> Result<GitLabMergeRequest, AppError> {
    for sha in commits {
        client.cherry_pick_commit(project_id, sha, temp_branch).await?;
    }

    let description = options
        .description
        .clone()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| format!("Cherry-pick commits: {}", commits.join(", ")));

    let request = MergeRequestOptions {
        title: merge_request_title(options, commits, target),
        description: Some(description),
        source_branch: temp_branch.to_string(),
        target_branch: target.to_string(),
        remove_source_branch: Some(true),
        ..Default::default()
    };

    client.create_merge_request(project_id, &request).await
}

fn failure(target: &str, error: AppError) -> CherryPickResult {
    CherryPickResult {
        target_branch: target.to_string(),
        success: false,
        merge_request: None,
        temp_branch_name: None,
        message: Some(format!(
            "Failed to create cherry-pick merge request for {}",
            target
        )),
        error: Some(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GitLabCommit;

    fn commit(sha: &str, committed_date: Option<&str>) -> GitLabCommit {
        serde_json::from_value(serde_json::json!({
            "id": sha,
            "committed_date": committed_date,
        }))
        .unwrap()
    }

    fn options(commits: &[&str], details: Option<Vec<GitLabCommit>>) -> CherryPickOptions {
        CherryPickOptions {
            commits: commits.iter().map(|s| s.to_string()).collect(),
            target_branches: vec!["main".to_string()],
            commit_details: details,
            ..Default::default()
        }
    }

    #[test]
    fn test_commits_ordered_by_commit_time_when_details_cover_all() {
        let opts = options(
            &["ccc", "aaa", "bbb"],
            Some(vec![
                commit("aaa", Some("2024-01-01T10:00:00Z")),
                commit("bbb", Some("2024-01-02T10:00:00+02:00")),
                commit("ccc", Some("2024-01-03T09:00:00Z")),
            ]),
        );

        assert_eq!(ordered_commits(&opts), vec!["aaa", "bbb", "ccc"]);
    }

    #[test]
    fn test_input_order_kept_without_details() {
        assert_eq!(ordered_commits(&options(&["b", "a"], None)), vec!["b", "a"]);
        assert_eq!(
            ordered_commits(&options(&["b", "a"], Some(vec![]))),
            vec!["b", "a"]
        );
    }

    #[test]
    fn test_input_order_kept_when_a_date_is_missing() {
        let opts = options(
            &["b", "a"],
            Some(vec![
                commit("a", Some("2024-01-01T10:00:00Z")),
                commit("b", None),
            ]),
        );
        assert_eq!(ordered_commits(&opts), vec!["b", "a"]);
    }

    #[test]
    fn test_temp_branch_name_is_sanitized_and_unique() {
        let first = temp_branch_name("release/1.0");
        let second = temp_branch_name("release/1.0");

        assert!(first.starts_with("cherry-pick-release-1.0-"));
        assert!(!first.contains('/'));
        assert_ne!(first, second);
    }

    #[test]
    fn test_title_generation() {
        let mut opts = options(&["ed899a2f4b50b4370feeea94676502b42383c746"], None);
        let commits = opts.commits.clone();
        assert_eq!(
            merge_request_title(&opts, &commits, "main"),
            "Cherry-pick: ed899a2f to main"
        );

        opts.title_prefix = Some("Backport".to_string());
        assert_eq!(
            merge_request_title(&opts, &commits, "stable"),
            "Backport: ed899a2f to stable"
        );

        opts.title = Some("Fix login on stable".to_string());
        assert_eq!(
            merge_request_title(&opts, &commits, "stable"),
            "Fix login on stable"
        );
    }
}
