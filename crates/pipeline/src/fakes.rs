//! In-memory fakes for the port traits (testing only).
//!
//! [`RecordingGitHubApi`] records every call it receives and answers from a
//! per-endpoint script, so tests can assert on exactly which calls a
//! notification made.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    ApiReply, GitHubApi, IssueRequest, RefLookup, RepositoryId, SecretError, SecretGetter,
    TransportError,
};

// ---------------------------------------------------------------------------
// RecordingGitHubApi
// ---------------------------------------------------------------------------

/// One call received by [`RecordingGitHubApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    CreateIssue { repo: String, request: IssueRequest },
    /// `path` is the lookup path below `/repos`, e.g. `acme/widgets/commits/main`.
    LookupRef { path: String },
    CloseIssue { url: String },
}

#[derive(Debug, Clone)]
enum Behavior {
    Reply(ApiReply),
    Fail,
    Hang,
}

/// Scripted [`GitHubApi`].
///
/// Defaults: create answers `201` with an open issue, lookup answers `200`
/// with `{}`, close answers `200`.
#[derive(Debug)]
pub struct RecordingGitHubApi {
    create: Behavior,
    lookup: Behavior,
    close: Behavior,
    calls: Mutex<Vec<RecordedCall>>,
}

impl Default for RecordingGitHubApi {
    fn default() -> Self {
        Self {
            create: Behavior::Reply(ApiReply::new(
                201,
                r#"{"state":"open","url":"https://api.github.com/repos/acme/widgets/issues/1","number":1}"#,
            )),
            lookup: Behavior::Reply(ApiReply::new(200, "{}")),
            close: Behavior::Reply(ApiReply::new(200, r#"{"state":"closed"}"#)),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl RecordingGitHubApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_create_reply(mut self, reply: ApiReply) -> Self {
        self.create = Behavior::Reply(reply);
        self
    }

    pub fn with_lookup_reply(mut self, reply: ApiReply) -> Self {
        self.lookup = Behavior::Reply(reply);
        self
    }

    pub fn with_close_reply(mut self, reply: ApiReply) -> Self {
        self.close = Behavior::Reply(reply);
        self
    }

    /// Create calls fail at the transport level.
    pub fn failing_create(mut self) -> Self {
        self.create = Behavior::Fail;
        self
    }

    /// Lookup calls fail at the transport level.
    pub fn failing_lookup(mut self) -> Self {
        self.lookup = Behavior::Fail;
        self
    }

    /// Close calls fail at the transport level.
    pub fn failing_close(mut self) -> Self {
        self.close = Behavior::Fail;
        self
    }

    /// Create calls never complete.
    pub fn hanging_create(mut self) -> Self {
        self.create = Behavior::Hang;
        self
    }

    /// All calls received so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock_calls().clone()
    }

    pub fn create_calls(&self) -> usize {
        self.count(|call| matches!(call, RecordedCall::CreateIssue { .. }))
    }

    pub fn lookup_calls(&self) -> usize {
        self.count(|call| matches!(call, RecordedCall::LookupRef { .. }))
    }

    pub fn close_calls(&self) -> usize {
        self.count(|call| matches!(call, RecordedCall::CloseIssue { .. }))
    }

    fn count(&self, predicate: impl Fn(&RecordedCall) -> bool) -> usize {
        self.lock_calls().iter().filter(|c| predicate(c)).count()
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<RecordedCall>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: RecordedCall) {
        self.lock_calls().push(call);
    }

    async fn answer(
        behavior: &Behavior,
        operation: &'static str,
        url: String,
    ) -> Result<ApiReply, TransportError> {
        match behavior {
            Behavior::Reply(reply) => Ok(reply.clone()),
            Behavior::Fail => Err(TransportError::new(
                operation,
                url,
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"),
            )),
            Behavior::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl GitHubApi for RecordingGitHubApi {
    async fn create_issue(
        &self,
        repo: &RepositoryId,
        request: &IssueRequest,
    ) -> Result<ApiReply, TransportError> {
        self.record(RecordedCall::CreateIssue {
            repo: repo.to_string(),
            request: request.clone(),
        });
        Self::answer(&self.create, "create issue", format!("{repo}/issues")).await
    }

    async fn lookup_ref(&self, lookup: &RefLookup) -> Result<ApiReply, TransportError> {
        let path = lookup.path();
        self.record(RecordedCall::LookupRef { path: path.clone() });
        Self::answer(&self.lookup, "lookup ref", path).await
    }

    async fn close_issue(&self, issue_url: &str) -> Result<ApiReply, TransportError> {
        self.record(RecordedCall::CloseIssue {
            url: issue_url.to_string(),
        });
        Self::answer(&self.close, "close issue", issue_url.to_string()).await
    }
}

// ---------------------------------------------------------------------------
// StaticSecretGetter
// ---------------------------------------------------------------------------

/// [`SecretGetter`] answering from a fixed resource → value map.
#[derive(Debug, Clone, Default)]
pub struct StaticSecretGetter(BTreeMap<String, String>);

impl StaticSecretGetter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resource: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(resource.into(), value.into());
        self
    }
}

#[async_trait]
impl SecretGetter for StaticSecretGetter {
    async fn get_secret(&self, resource: &str) -> Result<String, SecretError> {
        self.0
            .get(resource)
            .cloned()
            .ok_or_else(|| SecretError::UnsupportedResource {
                resource: resource.to_string(),
            })
    }
}
