use async_trait::async_trait;
use pipeline::{ApiReply, GitHubApi, IssueRequest, RefLookup, RepositoryId, TransportError};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

/// Base URL of the repository-scoped REST API.
pub const GITHUB_API_ENDPOINT: &str = "https://api.github.com/repos";
/// Fixed `Accept` header sent on every call.
pub const ACCEPT_HEADER: &str = "application/vnd.github.v3+json";
/// Fixed `User-Agent` header sent on every call.
pub const USER_AGENT: &str = "GCB-Notifier/0.1 (http)";

/// The client could not be constructed.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("GitHub token contains characters not allowed in an HTTP header")]
    InvalidToken(#[source] reqwest::header::InvalidHeaderValue),

    #[error("failed to create GitHub API client")]
    Build(#[source] reqwest::Error),
}

/// Authenticated GitHub REST client.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    endpoint: String,
}

impl GithubClient {
    /// Creates a client for `api.github.com`.
    pub fn new(token: &str) -> Result<Self, ClientError> {
        Self::with_endpoint(GITHUB_API_ENDPOINT, token)
    }

    /// Creates a client for a custom `/repos` base (GitHub Enterprise, tests).
    pub fn with_endpoint(endpoint: impl Into<String>, token: &str) -> Result<Self, ClientError> {
        let mut auth = HeaderValue::from_str(&format!("token {}", token.trim()))
            .map_err(ClientError::InvalidToken)?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HEADER));
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(USER_AGENT)
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(
        &self,
        operation: &'static str,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<ApiReply, TransportError> {
        let response = request
            .send()
            .await
            .map_err(|err| TransportError::new(operation, url, err))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| TransportError::new(operation, url, err))?;
        debug!(operation, url, status, "GitHub API call completed");
        Ok(ApiReply::new(status, body))
    }
}

#[async_trait]
impl GitHubApi for GithubClient {
    async fn create_issue(
        &self,
        repo: &RepositoryId,
        request: &IssueRequest,
    ) -> Result<ApiReply, TransportError> {
        let url = format!("{}/{}/issues", self.endpoint, repo);
        self.send("create issue", &url, self.http.post(&url).json(request))
            .await
    }

    async fn lookup_ref(&self, lookup: &RefLookup) -> Result<ApiReply, TransportError> {
        let url = format!("{}/{}", self.endpoint, lookup.path());
        self.send("lookup ref", &url, self.http.get(&url)).await
    }

    async fn close_issue(&self, issue_url: &str) -> Result<ApiReply, TransportError> {
        let body = json!({ "state": "closed" });
        self.send("close issue", issue_url, self.http.patch(issue_url).json(&body))
            .await
    }
}
