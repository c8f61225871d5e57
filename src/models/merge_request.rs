//! Merge request model.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a merge request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeRequestState {
    Opened,
    Closed,
    Locked,
    Merged,
}

impl From<&str> for MergeRequestState {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "merged" => Self::Merged,
            "closed" => Self::Closed,
            "locked" => Self::Locked,
            _ => Self::Opened,
        }
    }
}

impl fmt::Display for MergeRequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Opened => write!(f, "opened"),
            Self::Closed => write!(f, "closed"),
            Self::Locked => write!(f, "locked"),
            Self::Merged => write!(f, "merged"),
        }
    }
}

/// Legacy tri-state `merge_status` field.
///
/// Values this crate does not know are kept verbatim in `Other` and written
/// back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MergeStatus {
    CanBeMerged,
    CannotBeMerged,
    Checking,
    Unchecked,
    CannotBeMergedRecheck,
    Other(String),
}

impl MergeStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::CanBeMerged => "can_be_merged",
            Self::CannotBeMerged => "cannot_be_merged",
            Self::Checking => "checking",
            Self::Unchecked => "unchecked",
            Self::CannotBeMergedRecheck => "cannot_be_merged_recheck",
            Self::Other(raw) => raw,
        }
    }

    /// Whether GitLab is still computing mergeability.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Checking | Self::Unchecked)
    }
}

impl From<String> for MergeStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "can_be_merged" => Self::CanBeMerged,
            "cannot_be_merged" => Self::CannotBeMerged,
            "checking" => Self::Checking,
            "unchecked" => Self::Unchecked,
            "cannot_be_merged_recheck" => Self::CannotBeMergedRecheck,
            _ => Self::Other(s),
        }
    }
}

impl From<MergeStatus> for String {
    fn from(status: MergeStatus) -> Self {
        match status {
            MergeStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for MergeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Granular `detailed_merge_status` field.
///
/// GitLab keeps adding values (`ci_must_pass`, `draft_status`, ...); those
/// are kept verbatim in `Other` and count as settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DetailedMergeStatus {
    Mergeable,
    Conflict,
    Unchecked,
    Checking,
    CannotBeMerged,
    CannotBeMergedRecheck,
    Other(String),
}

impl DetailedMergeStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Mergeable => "mergeable",
            Self::Conflict => "conflict",
            Self::Unchecked => "unchecked",
            Self::Checking => "checking",
            Self::CannotBeMerged => "cannot_be_merged",
            Self::CannotBeMergedRecheck => "cannot_be_merged_recheck",
            Self::Other(raw) => raw,
        }
    }

    /// Whether GitLab is still computing mergeability.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Checking | Self::Unchecked)
    }
}

impl From<String> for DetailedMergeStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "mergeable" => Self::Mergeable,
            "conflict" => Self::Conflict,
            "unchecked" => Self::Unchecked,
            "checking" => Self::Checking,
            "cannot_be_merged" => Self::CannotBeMerged,
            "cannot_be_merged_recheck" => Self::CannotBeMergedRecheck,
            _ => Self::Other(s),
        }
    }
}

impl From<DetailedMergeStatus> for String {
    fn from(status: DetailedMergeStatus) -> Self {
        match status {
            DetailedMergeStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for DetailedMergeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// GitLab user from API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitLabUser {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub state: Option<String>,
    pub web_url: Option<String>,
}

/// GitLab merge request from API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitLabMergeRequest {
    /// GitLab MR ID (global).
    pub id: i64,

    /// Project-scoped MR number.
    pub iid: i64,

    pub project_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub state: MergeRequestState,

    pub merge_status: Option<MergeStatus>,
    pub detailed_merge_status: Option<DetailedMergeStatus>,
    pub has_conflicts: Option<bool>,

    pub source_branch: String,
    pub target_branch: String,
    pub author: Option<GitLabUser>,
    pub web_url: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub merged_at: Option<String>,
    pub closed_at: Option<String>,
    pub merge_commit_sha: Option<String>,
}

impl GitLabMergeRequest {
    /// Reference identifying this MR for conflict polling.
    pub fn reference(&self) -> MergeRequestRef {
        MergeRequestRef::new(self.project_id, self.iid)
    }

    /// Whether GitLab has finished computing mergeability.
    ///
    /// `detailed_merge_status` wins when present; otherwise `merge_status`
    /// decides. With neither field there is nothing settled to report.
    pub fn is_merge_status_final(&self) -> bool {
        match (&self.detailed_merge_status, &self.merge_status) {
            (Some(detailed), _) => !detailed.is_pending(),
            (None, Some(legacy)) => !legacy.is_pending(),
            (None, None) => false,
        }
    }
}

/// Identifies one merge request: `(project, iid)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequestRef {
    pub project_id: i64,
    pub mr_iid: i64,
}

impl MergeRequestRef {
    pub fn new(project_id: i64, mr_iid: i64) -> Self {
        Self { project_id, mr_iid }
    }
}

impl fmt::Display for MergeRequestRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", self.project_id, self.mr_iid)
    }
}

/// Body of `POST /projects/:id/merge_requests`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeRequestOptions {
    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub source_branch: String,
    pub target_branch: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove_source_branch: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub squash: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer_ids: Option<Vec<i64>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

/// Body of `PUT /projects/:id/merge_requests/:iid/merge`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcceptMergeRequestOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_commit_message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub squash: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub should_remove_source_branch: Option<bool>,

    /// Merge only if the source branch head still matches this SHA.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

/// Outcome of creating a single merge request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeResult {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_request: Option<GitLabMergeRequest>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
