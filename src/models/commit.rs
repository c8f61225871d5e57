//! GitLab commit model.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Line statistics attached to a single commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStats {
    pub additions: i64,
    pub deletions: i64,
    pub total: i64,
}

/// GitLab commit from API.
///
/// The same shape is embedded in branch listings, where GitLab omits a few
/// fields, so everything beyond the SHA and title defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitLabCommit {
    /// Full commit SHA.
    pub id: String,

    #[serde(default)]
    pub short_id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub author_name: String,

    #[serde(default)]
    pub author_email: String,

    pub authored_date: Option<String>,

    #[serde(default)]
    pub committer_name: String,

    #[serde(default)]
    pub committer_email: String,

    /// ISO 8601 commit timestamp, used to order cherry-picks.
    pub committed_date: Option<String>,

    pub created_at: Option<String>,

    pub web_url: Option<String>,

    #[serde(default)]
    pub parent_ids: Vec<String>,

    pub stats: Option<CommitStats>,
}

impl GitLabCommit {
    /// Parse `committed_date` into a timestamp.
    pub fn committed_at(&self) -> Option<DateTime<FixedOffset>> {
        self.committed_date
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
    }

    /// Short SHA, derived from the full SHA when GitLab did not send one.
    pub fn short_sha(&self) -> &str {
        if self.short_id.is_empty() {
            short_sha(&self.id)
        } else {
            &self.short_id
        }
    }
}

/// First eight characters of a SHA, as GitLab abbreviates them.
pub fn short_sha(sha: &str) -> &str {
    sha.get(..8).unwrap_or(sha)
}
