//! Issue dispatcher: creates the issue, then closes it unless a repository
//! opts out.
//!
//! Issues are left as a closed, auditable record by default. A repository
//! keeps them open by setting `DISABLE_AUTO_CLOSE__{owner}/{name}` to exactly
//! `"true"` in the [`OverrideStore`]. The override is consulted before the
//! close call is issued.
//!
//! | Step | Failure | Effect |
//! |------|---------|--------|
//! | create | transport error | abort ([`NotifyError::Transport`]) |
//! | create | non-2xx status | warning, no close |
//! | decode create body | malformed | warning, no close |
//! | close | transport error / non-200 | warning |
//! | any | cancellation | abort ([`NotifyError::Cancelled`]) |

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    CancellationToken, GitHubApi, IssueRequest, IssueResponse, NotifyError, OverrideStore,
    RepositoryId,
};

/// Prefix of the per-repository auto-close override key.
pub const AUTO_CLOSE_OVERRIDE_PREFIX: &str = "DISABLE_AUTO_CLOSE__";

/// Returns the override key for `repo`, e.g. `DISABLE_AUTO_CLOSE__acme/widgets`.
pub fn auto_close_override_key(repo: &RepositoryId) -> String {
    format!("{AUTO_CLOSE_OVERRIDE_PREFIX}{repo}")
}

/// What happened after the create call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Create did not return `201 Created`; nothing to close.
    NotCreated,
    /// The repository's override disabled auto-close.
    DisabledByOverride,
    /// The create response could not be decoded or carried no issue URL.
    Undecodable,
    /// The issue was not reported as open.
    NotOpen,
    /// The close call completed with this status.
    CloseAttempted { status: u16 },
    /// The close call failed at the transport level.
    CloseFailed,
}

/// Summary of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub create_status: u16,
    /// Decoded create response, when the issue was created and decodable.
    pub issue: Option<IssueResponse>,
    pub close: CloseOutcome,
}

impl DispatchReport {
    fn new(create_status: u16, issue: Option<IssueResponse>, close: CloseOutcome) -> Self {
        Self {
            create_status,
            issue,
            close,
        }
    }
}

/// Performs the create / auto-close call sequence against a [`GitHubApi`].
#[derive(Clone)]
pub struct IssueDispatcher {
    api: Arc<dyn GitHubApi>,
    overrides: Arc<dyn OverrideStore>,
}

impl IssueDispatcher {
    pub fn new(api: Arc<dyn GitHubApi>, overrides: Arc<dyn OverrideStore>) -> Self {
        Self { api, overrides }
    }

    /// `true` when the override for `repo` is exactly `"true"`.
    pub fn auto_close_disabled(&self, repo: &RepositoryId) -> bool {
        self.overrides
            .get(&auto_close_override_key(repo))
            .is_some_and(|value| value == "true")
    }

    pub async fn dispatch(
        &self,
        repo: &RepositoryId,
        request: &IssueRequest,
        cancel: &CancellationToken,
    ) -> Result<DispatchReport, NotifyError> {
        let created = cancel
            .run(self.api.create_issue(repo, request))
            .await
            .map_err(|_| NotifyError::Cancelled)??;

        if created.is_success() {
            debug!(%repo, status = created.status, "sent create issue request");
        } else {
            warn!(%repo, status = created.status, "got a non-OK response status from create issue");
        }

        if !created.is_created() {
            return Ok(DispatchReport::new(created.status, None, CloseOutcome::NotCreated));
        }

        if self.auto_close_disabled(repo) {
            info!(%repo, "auto-close disabled for repository");
            return Ok(DispatchReport::new(
                created.status,
                None,
                CloseOutcome::DisabledByOverride,
            ));
        }

        let issue: IssueResponse = match serde_json::from_str(&created.body) {
            Ok(issue) => issue,
            Err(err) => {
                warn!(%repo, error = %err, "failed to decode create issue response");
                return Ok(DispatchReport::new(created.status, None, CloseOutcome::Undecodable));
            }
        };

        if !issue.is_open() {
            return Ok(DispatchReport::new(created.status, Some(issue), CloseOutcome::NotOpen));
        }

        let Some(issue_url) = issue.url.clone() else {
            warn!(%repo, "create issue response has no issue url");
            return Ok(DispatchReport::new(
                created.status,
                Some(issue),
                CloseOutcome::Undecodable,
            ));
        };

        let close = match cancel.run(self.api.close_issue(&issue_url)).await {
            Err(_) => return Err(NotifyError::Cancelled),
            Ok(Err(err)) => {
                warn!(url = %issue_url, error = %err, "failed to close issue");
                CloseOutcome::CloseFailed
            }
            Ok(Ok(reply)) => {
                if reply.is_ok() {
                    debug!(url = %issue_url, "sent close issue request");
                } else {
                    warn!(url = %issue_url, status = reply.status, "got a non-OK response status from close issue");
                }
                CloseOutcome::CloseAttempted {
                    status: reply.status,
                }
            }
        };

        Ok(DispatchReport::new(created.status, Some(issue), close))
    }
}
