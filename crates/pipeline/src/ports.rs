//! Port traits implemented by infrastructure crates and host runtimes.
//!
//! | Trait | Implemented by |
//! |-------|----------------|
//! | [`GitHubApi`] | `github::GithubClient`, [`crate::fakes::RecordingGitHubApi`] |
//! | [`SecretGetter`] | `cli::secrets::LocalSecretGetter`, [`crate::fakes::StaticSecretGetter`] |
//! | [`BindingResolver`] | [`crate::ParamBindingResolver`] |
//! | [`OverrideStore`] | [`EnvOverrides`], [`MapOverrides`] |

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::{
    ApiReply, BindingError, BuildEvent, IssueRequest, RefLookup, RepositoryId, SecretError,
    TransportError,
};

/// The three GitHub REST calls the notifier makes.
///
/// Implementations attach authentication and the fixed `Accept` /
/// `User-Agent` headers, perform exactly one attempt, and return the raw
/// status and body. Only transport-level failures are errors.
#[async_trait]
pub trait GitHubApi: Send + Sync {
    /// `POST /repos/{repo}/issues`.
    async fn create_issue(
        &self,
        repo: &RepositoryId,
        request: &IssueRequest,
    ) -> Result<ApiReply, TransportError>;

    /// `GET /repos/{repo}/commits/{ref}` or `GET /repos/{repo}/releases/tags/{ref}`.
    async fn lookup_ref(&self, lookup: &RefLookup) -> Result<ApiReply, TransportError>;

    /// `PATCH {issue_url}` with `{"state":"closed"}`.
    async fn close_issue(&self, issue_url: &str) -> Result<ApiReply, TransportError>;
}

/// Retrieves secret values by resource name.
#[async_trait]
pub trait SecretGetter: Send + Sync {
    async fn get_secret(&self, resource: &str) -> Result<String, SecretError>;
}

/// Resolves template bindings (`params`) for one build event.
///
/// Resolution never fails as a whole: a binding that cannot be resolved is
/// bound to `""` and reported in [`ResolvedBindings::failures`].
pub trait BindingResolver: Send + Sync {
    fn resolve(&self, event: &BuildEvent) -> ResolvedBindings;
}

/// Bindings for one event, plus the entries that degraded to `""`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedBindings {
    pub params: BTreeMap<String, String>,
    pub failures: Vec<BindingError>,
}

/// Read-only key/value lookup for per-repository behaviour overrides.
pub trait OverrideStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// [`OverrideStore`] backed by the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvOverrides;

impl OverrideStore for EnvOverrides {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// [`OverrideStore`] backed by an in-memory map.
#[derive(Debug, Clone, Default)]
pub struct MapOverrides(BTreeMap<String, String>);

impl MapOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an override, returning the store for chaining.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }
}

impl OverrideStore for MapOverrides {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}
