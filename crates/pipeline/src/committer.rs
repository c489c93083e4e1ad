//! Committer resolver: attributes a build to the account behind its ref.
//!
//! Tag builds are looked up through the release for the tag, everything else
//! through the commit for the ref. The two GitHub resources have different
//! shapes, so the body is decoded into [`LookupResponse`], trying the commit
//! shape first and falling back to the release shape.
//!
//! Identity priority (first match wins):
//!
//! 1. `author.login` when `author.type == "User"`: a stable handle, and it
//!    sidesteps bot committers such as the web-edit committer.
//! 2. `commit.committer.name`
//! 3. `commit.author.name`
//!
//! When nothing matches the identity is empty, which is not an error.

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::types::substitution_keys;
use crate::{
    BuildEvent, CancellationToken, CommitterError, GitHubApi, RefName, RepositoryId,
};

// ---------------------------------------------------------------------------
// Lookup target
// ---------------------------------------------------------------------------

/// Which GitHub resource identifies the triggering ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefLookup {
    /// `GET /repos/{repo}/commits/{ref}`
    Commit {
        repo: RepositoryId,
        reference: RefName,
    },
    /// `GET /repos/{repo}/releases/tags/{ref}`
    ReleaseTag {
        repo: RepositoryId,
        reference: RefName,
    },
}

impl RefLookup {
    /// Chooses the lookup for `event`: the release endpoint when `TAG_NAME` is
    /// set, otherwise the commit endpoint. Both are keyed by `REF_NAME`.
    pub fn for_event(event: &BuildEvent, repo: &RepositoryId) -> Result<Self, CommitterError> {
        let reference = event
            .substitution(substitution_keys::REF_NAME)
            .and_then(RefName::new)
            .ok_or(CommitterError::MissingRef)?;
        let repo = repo.clone();
        if event.substitution(substitution_keys::TAG_NAME).is_some() {
            Ok(Self::ReleaseTag { repo, reference })
        } else {
            Ok(Self::Commit { repo, reference })
        }
    }

    /// Path below the `/repos` API base, e.g. `acme/widgets/commits/main`.
    ///
    /// The ref is percent-encoded per `/`-separated segment, so `fix#12`
    /// becomes `fix%2312` while `feature/login` keeps its slash.
    pub fn path(&self) -> String {
        match self {
            Self::Commit { repo, reference } => {
                format!("{repo}/commits/{}", encode_ref(reference.as_str()))
            }
            Self::ReleaseTag { repo, reference } => {
                format!("{repo}/releases/tags/{}", encode_ref(reference.as_str()))
            }
        }
    }
}

fn encode_ref(reference: &str) -> String {
    let Ok(mut url) = Url::parse("http://localhost/") else {
        return reference.to_string();
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.clear().extend(reference.split('/'));
    }
    url.path()
        .strip_prefix('/')
        .unwrap_or(url.path())
        .to_string()
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

/// A GitHub account object (`author` on commits and releases).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Account {
    pub login: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// A Git signature (`commit.author` / `commit.committer`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Signature {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CommitDetail {
    pub committer: Option<Signature>,
    pub author: Option<Signature>,
}

/// Response of `GET /repos/{repo}/commits/{ref}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommitResponse {
    pub author: Option<Account>,
    pub commit: CommitDetail,
}

/// Response of `GET /repos/{repo}/releases/tags/{tag}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseResponse {
    pub author: Option<Account>,
}

/// Decoded ref lookup, one variant per known shape.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LookupResponse {
    Commit(CommitResponse),
    Release(ReleaseResponse),
}

impl LookupResponse {
    /// Decodes `body`, trying the commit shape before the release shape.
    pub fn decode(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    fn author(&self) -> Option<&Account> {
        match self {
            Self::Commit(commit) => commit.author.as_ref(),
            Self::Release(release) => release.author.as_ref(),
        }
    }

    /// Applies the identity priority order.
    pub fn committer(&self) -> CommitterResolution {
        if let Some(login) = self
            .author()
            .filter(|author| author.kind.as_deref() == Some("User"))
            .and_then(|author| non_empty(author.login.as_deref()))
        {
            return CommitterResolution::AuthorLogin(login.to_string());
        }

        let Self::Commit(commit) = self else {
            return CommitterResolution::Unresolved;
        };
        let detail = &commit.commit;
        if let Some(name) = detail
            .committer
            .as_ref()
            .and_then(|sig| non_empty(sig.name.as_deref()))
        {
            return CommitterResolution::CommitterName(name.to_string());
        }
        if let Some(name) = detail
            .author
            .as_ref()
            .and_then(|sig| non_empty(sig.name.as_deref()))
        {
            return CommitterResolution::AuthorName(name.to_string());
        }
        CommitterResolution::Unresolved
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// The single identity chosen for a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitterResolution {
    AuthorLogin(String),
    CommitterName(String),
    AuthorName(String),
    Unresolved,
}

impl CommitterResolution {
    /// The identity string; empty when unresolved.
    pub fn identity(&self) -> &str {
        match self {
            Self::AuthorLogin(value) | Self::CommitterName(value) | Self::AuthorName(value) => {
                value
            }
            Self::Unresolved => "",
        }
    }
}

/// Looks up the committer identity for the ref that triggered `event`.
///
/// Performs one GET; anything other than `200 OK` is an error.
pub async fn resolve_committer(
    api: &dyn GitHubApi,
    event: &BuildEvent,
    repo: &RepositoryId,
    cancel: &CancellationToken,
) -> Result<CommitterResolution, CommitterError> {
    let lookup = RefLookup::for_event(event, repo)?;
    let reply = cancel
        .run(api.lookup_ref(&lookup))
        .await
        .map_err(|_| CommitterError::Cancelled)??;

    if !reply.is_ok() {
        return Err(CommitterError::UnexpectedStatus {
            status: reply.status,
            url: lookup.path(),
        });
    }

    let response = LookupResponse::decode(&reply.body).map_err(|source| CommitterError::Decode {
        url: lookup.path(),
        source,
    })?;
    let resolution = response.committer();
    debug!(lookup = %lookup.path(), ?resolution, "resolved committer");
    Ok(resolution)
}
