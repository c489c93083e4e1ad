//! Repository resolver: reads the target repository from event metadata.

use crate::types::substitution_keys;
use crate::{BuildEvent, RepositoryId};

/// Returns the repository named by the `REPO_FULL_NAME` substitution.
///
/// `None` when the substitution is absent, empty, or not an `owner/name`
/// slug; the caller skips the notification.
pub fn resolve_repo(event: &BuildEvent) -> Option<RepositoryId> {
    event
        .substitution(substitution_keys::REPO_FULL_NAME)
        .and_then(RepositoryId::parse)
}
