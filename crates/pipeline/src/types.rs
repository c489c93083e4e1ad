//! Shared value types for the notification domain.
//!
//! [`BuildEvent`] mirrors the JSON shape the build system publishes (camelCase
//! field names), so the same serialisation feeds the event filter, the message
//! renderer, and the inbound listener.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Substitution keys
// ---------------------------------------------------------------------------

/// Well-known substitution keys consumed and produced by the pipeline.
pub mod substitution_keys {
    /// Fully qualified `owner/name` slug of the repository that triggered the build.
    pub const REPO_FULL_NAME: &str = "REPO_FULL_NAME";
    /// Branch or tag name of the triggering ref.
    pub const REF_NAME: &str = "REF_NAME";
    /// Present (non-empty) only for tag-triggered builds.
    pub const TAG_NAME: &str = "TAG_NAME";
    /// Reserved output key: the resolved committer identity.
    pub const COMMITTER_LOGIN: &str = "GH_COMMITTER_LOGIN";
}

// ---------------------------------------------------------------------------
// Build events
// ---------------------------------------------------------------------------

/// Lifecycle status of a build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildStatus {
    Pending,
    Queued,
    Working,
    Success,
    Failure,
    InternalError,
    Timeout,
    Cancelled,
    Expired,
    /// Unrecognised or unset status.
    #[default]
    #[serde(other)]
    StatusUnknown,
}

impl BuildStatus {
    /// Returns the wire name of the status (e.g. `"FAILURE"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StatusUnknown => "STATUS_UNKNOWN",
            Self::Pending => "PENDING",
            Self::Queued => "QUEUED",
            Self::Working => "WORKING",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::InternalError => "INTERNAL_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Cancelled => "CANCELLED",
            Self::Expired => "EXPIRED",
        }
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A snapshot of one CI build.
///
/// Owned by the caller. The pipeline borrows it mutably for one notification
/// attempt and writes two things back: the committer identity under
/// [`substitution_keys::COMMITTER_LOGIN`] and the tracking-tagged `log_url`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildEvent {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub project_id: String,

    #[serde(default)]
    pub status: BuildStatus,

    #[serde(default)]
    pub log_url: String,

    #[serde(default)]
    pub substitutions: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_trigger_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_time: Option<DateTime<Utc>>,
}

impl BuildEvent {
    /// Returns the substitution stored under `key`, treating empty values as absent.
    pub fn substitution(&self, key: &str) -> Option<&str> {
        self.substitutions
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set_substitution(&mut self, key: &str, value: impl Into<String>) {
        self.substitutions.insert(key.to_string(), value.into());
    }
}

// ---------------------------------------------------------------------------
// Issue payloads
// ---------------------------------------------------------------------------

/// Outbound create-issue payload, produced by template expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRequest {
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assignees: Vec<String>,
}

/// The subset of GitHub's issue representation the dispatcher reads.
///
/// Every field is optional: a partially populated response is still usable,
/// and absence is reported explicitly instead of failing the decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IssueResponse {
    pub state: Option<String>,
    /// API URL of the issue; target of the close call.
    pub url: Option<String>,
    pub html_url: Option<String>,
    pub number: Option<u64>,
}

impl IssueResponse {
    /// Returns `true` when GitHub reports the issue as `"open"`.
    pub fn is_open(&self) -> bool {
        self.state.as_deref() == Some("open")
    }
}

// ---------------------------------------------------------------------------
// Transport replies
// ---------------------------------------------------------------------------

/// Raw HTTP reply returned by a [`crate::GitHubApi`] call.
///
/// Status interpretation is a domain decision, so adapters hand back the
/// status code and body untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiReply {
    pub status: u16,
    pub body: String,
}

impl ApiReply {
    /// Creates a reply from a status code and body.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// `200 OK`.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// `201 Created`.
    pub fn is_created(&self) -> bool {
        self.status == 201
    }

    /// Any `2xx` status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
