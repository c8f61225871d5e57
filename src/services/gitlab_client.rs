//! GitLab API client.
//!
//! Provides HTTP client for GitLab API v4 with bearer-token authentication,
//! covering the project, branch, commit and merge request endpoints the
//! merge workflow needs.

use crate::error::AppError;
use crate::models::{
    AcceptMergeRequestOptions, GitLabBranch, GitLabCommit, GitLabMergeRequest, GitLabProject,
    GitLabUser, MergeRequestOptions, MergeRequestRef,
};
use crate::services::conflict_tracker::MergeStatusSource;
use async_trait::async_trait;
use log::debug;
use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

/// User agent sent with every request.
const USER_AGENT: &str = concat!("fast-merge/", env!("CARGO_PKG_VERSION"));

/// Minimum keyword length treated as a possible commit SHA.
const MIN_SHA_SEARCH_LEN: usize = 7;

/// GitLab API client configuration.
#[derive(Debug, Clone)]
pub struct GitLabClientConfig {
    /// Base URL of the GitLab instance (e.g., `https://gitlab.com`).
    pub base_url: String,

    /// Personal access token for authentication.
    pub token: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GitLabClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: String::new(),
            timeout_secs: 30,
        }
    }
}

/// GitLab API client.
#[derive(Debug, Clone)]
pub struct GitLabClient {
    client: Client,
    config: GitLabClientConfig,
}

/// Query parameters for listing projects.
#[derive(Debug, Clone, Serialize)]
struct ProjectsQuery<'a> {
    page: u32,
    per_page: u32,
    membership: bool,
    simple: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    search: Option<&'a str>,
}

/// Query parameters for listing commits.
#[derive(Debug, Clone, Serialize)]
struct CommitsQuery<'a> {
    ref_name: &'a str,
    page: u32,
    per_page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    search: Option<&'a str>,
}

impl GitLabClient {
    /// Create a new GitLab client.
    pub fn new(config: GitLabClientConfig) -> Result<Self, AppError> {
        if config.base_url.trim().is_empty() || config.token.trim().is_empty() {
            return Err(AppError::configuration(
                "GitLab base URL and access token must both be set",
            ));
        }

        let mut headers = header::HeaderMap::new();

        let token_value = header::HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|_| AppError::configuration("Invalid token format"))?;
        headers.insert(header::AUTHORIZATION, token_value);
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Base URL this client talks to.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Get the base URL for API requests.
    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/api/v4{}",
            self.config.base_url.trim_end_matches('/'),
            path
        )
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        self.client.request(method, self.api_url(endpoint))
    }

    /// Send a request and decode the JSON response.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        endpoint: &str,
    ) -> Result<T, AppError> {
        debug!("GitLab request: {}", endpoint);
        let response = request.send().await?;
        self.handle_response(response, endpoint).await
    }

    /// Handle API response errors.
    ///
    /// Empty success bodies decode as JSON `null`, so endpoints answering
    /// `204 No Content` can be read as `()`.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: Response,
        endpoint: &str,
    ) -> Result<T, AppError> {
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            let text = if body.trim().is_empty() { "null" } else { body.as_str() };
            return serde_json::from_str::<T>(text)
                .map_err(|e| AppError::internal(format!("Failed to parse response: {}", e)));
        }

        let status_code = status.as_u16();
        let parsed = serde_json::from_str::<serde_json::Value>(&body).ok();

        // GitLab returns errors as {"message": "..."}, {"message": {"base": [...]}}
        // or OAuth-style {"error": "...", "error_description": "..."}.
        let body_message = parsed.as_ref().and_then(|v| {
            v.get("message")
                .map(|m| match m.as_str() {
                    Some(s) => s.to_string(),
                    None => m.to_string(),
                })
                .or_else(|| {
                    v.get("error_description")
                        .and_then(|d| d.as_str())
                        .map(String::from)
                })
        });
        let error_code = parsed
            .as_ref()
            .and_then(|v| v.get("error"))
            .and_then(|e| e.as_str())
            .map(String::from);

        let message = body_message.unwrap_or_else(|| {
            format!(
                "HTTP {}: {}",
                status_code,
                status.canonical_reason().unwrap_or("Unknown Status")
            )
        });

        Err(AppError::gitlab_api_full(message, status_code, endpoint).with_error_code(error_code))
    }

    /// Fetch the authenticated user.
    pub async fn get_current_user(&self) -> Result<GitLabUser, AppError> {
        let endpoint = "/user";
        self.send(self.request(Method::GET, endpoint), endpoint).await
    }

    /// Check that the configured URL and token work.
    pub async fn test_connection(&self) -> Result<GitLabUser, AppError> {
        self.get_current_user().await
    }

    /// List projects the user is a member of, optionally filtered by name.
    pub async fn get_projects(
        &self,
        search: Option<&str>,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<GitLabProject>, AppError> {
        let endpoint = "/projects";
        let query = ProjectsQuery {
            page,
            per_page,
            membership: true,
            simple: true,
            search: search.filter(|s| !s.is_empty()),
        };
        self.send(self.request(Method::GET, endpoint).query(&query), endpoint)
            .await
    }

    /// Get a single project by ID.
    pub async fn get_project(&self, project_id: i64) -> Result<GitLabProject, AppError> {
        let endpoint = format!("/projects/{}", project_id);
        self.send(self.request(Method::GET, &endpoint), &endpoint).await
    }

    /// Get a project by its namespaced path (e.g., "group/project").
    ///
    /// Returns `None` when the project does not exist or is not visible.
    pub async fn get_project_by_path(
        &self,
        project_path: &str,
    ) -> Result<Option<GitLabProject>, AppError> {
        let endpoint = format!("/projects/{}", urlencoding::encode(project_path));
        match self.send(self.request(Method::GET, &endpoint), &endpoint).await {
            Ok(project) => Ok(Some(project)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// List repository branches, optionally filtered by name.
    pub async fn list_branches(
        &self,
        project_id: i64,
        search: Option<&str>,
    ) -> Result<Vec<GitLabBranch>, AppError> {
        let endpoint = format!("/projects/{}/repository/branches", project_id);
        let mut query = vec![("per_page", "100".to_string())];
        if let Some(search) = search.filter(|s| !s.is_empty()) {
            query.push(("search", search.to_string()));
        }
        self.send(self.request(Method::GET, &endpoint).query(&query), &endpoint)
            .await
    }

    /// Create a branch from an existing ref.
    pub async fn create_branch(
        &self,
        project_id: i64,
        branch: &str,
        from_ref: &str,
    ) -> Result<GitLabBranch, AppError> {
        let endpoint = format!("/projects/{}/repository/branches", project_id);
        let body = serde_json::json!({ "branch": branch, "ref": from_ref });
        self.send(self.request(Method::POST, &endpoint).json(&body), &endpoint)
            .await
    }

    /// Delete a branch.
    pub async fn delete_branch(&self, project_id: i64, branch: &str) -> Result<(), AppError> {
        let endpoint = format!(
            "/projects/{}/repository/branches/{}",
            project_id,
            urlencoding::encode(branch)
        );
        self.send::<serde_json::Value>(self.request(Method::DELETE, &endpoint), &endpoint)
            .await
            .map(|_| ())
    }

    /// List commits on a branch, optionally filtered by message.
    pub async fn list_commits(
        &self,
        project_id: i64,
        ref_name: &str,
        search: Option<&str>,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<GitLabCommit>, AppError> {
        let endpoint = format!("/projects/{}/repository/commits", project_id);
        let query = CommitsQuery {
            ref_name,
            page,
            per_page,
            search: search.filter(|s| !s.is_empty()),
        };
        self.send(self.request(Method::GET, &endpoint).query(&query), &endpoint)
            .await
    }

    /// Get a single commit by SHA.
    pub async fn get_commit(&self, project_id: i64, sha: &str) -> Result<GitLabCommit, AppError> {
        let endpoint = format!(
            "/projects/{}/repository/commits/{}",
            project_id,
            urlencoding::encode(sha)
        );
        self.send(self.request(Method::GET, &endpoint), &endpoint).await
    }

    /// Search commits by message, and by SHA when the keyword looks like one.
    ///
    /// An exact SHA hit is prepended unless the message search already
    /// returned it. A failed SHA lookup leaves the message results as they are.
    pub async fn search_commits(
        &self,
        project_id: i64,
        branch: &str,
        keyword: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<GitLabCommit>, AppError> {
        let mut commits = self
            .list_commits(project_id, branch, Some(keyword), page, per_page)
            .await?;

        if looks_like_sha(keyword) {
            match self.get_commit(project_id, keyword).await {
                Ok(commit) => {
                    if !commits.iter().any(|c| c.id == commit.id) {
                        commits.insert(0, commit);
                    }
                }
                Err(e) => debug!("No commit matches SHA {}: {}", keyword, e),
            }
        }

        Ok(commits)
    }

    /// Cherry-pick a commit onto a branch.
    pub async fn cherry_pick_commit(
        &self,
        project_id: i64,
        sha: &str,
        branch: &str,
    ) -> Result<GitLabCommit, AppError> {
        let endpoint = format!(
            "/projects/{}/repository/commits/{}/cherry_pick",
            project_id,
            urlencoding::encode(sha)
        );
        let body = serde_json::json!({ "branch": branch });
        self.send(self.request(Method::POST, &endpoint).json(&body), &endpoint)
            .await
    }

    /// Create a merge request.
    pub async fn create_merge_request(
        &self,
        project_id: i64,
        options: &MergeRequestOptions,
    ) -> Result<GitLabMergeRequest, AppError> {
        let endpoint = format!("/projects/{}/merge_requests", project_id);
        self.send(self.request(Method::POST, &endpoint).json(options), &endpoint)
            .await
    }

    /// Get a single merge request by project and IID.
    ///
    /// With `recheck`, GitLab is asked to recompute mergeability
    /// (`with_merge_status_recheck=true`).
    pub async fn get_merge_request(
        &self,
        project_id: i64,
        mr_iid: i64,
        recheck: bool,
    ) -> Result<GitLabMergeRequest, AppError> {
        let endpoint = format!("/projects/{}/merge_requests/{}", project_id, mr_iid);
        let mut request = self.request(Method::GET, &endpoint);
        if recheck {
            request = request.query(&[("with_merge_status_recheck", "true")]);
        }
        self.send(request, &endpoint).await
    }

    /// Close a merge request.
    pub async fn close_merge_request(
        &self,
        project_id: i64,
        mr_iid: i64,
    ) -> Result<GitLabMergeRequest, AppError> {
        let endpoint = format!("/projects/{}/merge_requests/{}", project_id, mr_iid);
        let body = serde_json::json!({ "state_event": "close" });
        self.send(self.request(Method::PUT, &endpoint).json(&body), &endpoint)
            .await
    }

    /// Accept (merge) a merge request.
    pub async fn accept_merge_request(
        &self,
        project_id: i64,
        mr_iid: i64,
        options: &AcceptMergeRequestOptions,
    ) -> Result<GitLabMergeRequest, AppError> {
        let endpoint = format!("/projects/{}/merge_requests/{}/merge", project_id, mr_iid);
        self.send(self.request(Method::PUT, &endpoint).json(options), &endpoint)
            .await
    }
}

#[async_trait]
impl MergeStatusSource for GitLabClient {
    async fn fetch_merge_status(
        &self,
        mr: MergeRequestRef,
    ) -> Result<GitLabMergeRequest, AppError> {
        self.get_merge_request(mr.project_id, mr.mr_iid, true).await
    }
}

/// Whether a search keyword could be an (abbreviated) commit SHA.
fn looks_like_sha(keyword: &str) -> bool {
    keyword.len() >= MIN_SHA_SEARCH_LEN && keyword.chars().all(|c| c.is_ascii_hexdigit())
}

/// The currently configured client, swapped whenever configuration changes.
///
/// Clones share the same slot. Without a client the slot keeps the
/// validation errors that cleared it, so API calls can say why they are
/// blocked.
#[derive(Debug, Clone, Default)]
pub struct SharedClient {
    inner: Arc<RwLock<ClientSlot>>,
}

#[derive(Debug, Default)]
struct ClientSlot {
    client: Option<GitLabClient>,
    errors: Vec<String>,
}

impl SharedClient {
    pub fn new(client: Option<GitLabClient>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ClientSlot {
                client,
                errors: Vec::new(),
            })),
        }
    }

    /// Install a freshly built client.
    pub async fn install(&self, client: GitLabClient) {
        let mut slot = self.inner.write().await;
        slot.client = Some(client);
        slot.errors.clear();
    }

    /// Drop the client because configuration became invalid.
    pub async fn clear(&self, errors: Vec<String>) {
        let mut slot = self.inner.write().await;
        slot.client = None;
        slot.errors = errors;
    }

    /// Get the current client.
    pub async fn get(&self) -> Result<GitLabClient, AppError> {
        let slot = self.inner.read().await;
        if let Some(client) = &slot.client {
            return Ok(client.clone());
        }

        let message = if slot.errors.is_empty() {
            "GitLab is not configured. Set the server address and access token first.".to_string()
        } else {
            slot.errors.join("; ")
        };
        Err(AppError::configuration_with_errors(message, slot.errors.clone()))
    }
}

#[async_trait]
impl MergeStatusSource for SharedClient {
    async fn fetch_merge_status(
        &self,
        mr: MergeRequestRef,
    ) -> Result<GitLabMergeRequest, AppError> {
        self.get().await?.fetch_merge_status(mr).await
    }
}
