//! The notification pipeline.
//!
//! ```text
//! filter → repository → committer → bindings → log URL → render → dispatch
//! ```
//!
//! Failure domains:
//!
//! - **skip**: filter rejects the event, or the repository is unresolvable.
//!   Returns [`NotificationOutcome::Skipped`]; no HTTP call is made.
//! - **warn**: a binding or the committer lookup fails. The pipeline
//!   continues with an empty value for that binding / an empty identity.
//! - **abort**: log URL rewrite, render, create transport error, or
//!   cancellation. Returns a [`NotifyError`].

use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Instrument};

use crate::committer::resolve_committer;
use crate::types::substitution_keys;
use crate::utm::add_utm_params;
use crate::{
    BindingResolver, BuildEvent, CancellationToken, CommitterError, CommitterResolution,
    DispatchReport, EventFilter, GitHubApi, IssueDispatcher, MessageRenderer, NotificationId,
    NotifierDocument, NotifyError, OverrideStore, ParamBindingResolver, RepositoryId,
    SecretGetter, SetupError,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Static configuration resolved once at setup and shared read-only by every
/// notification.
#[derive(Debug)]
pub struct NotifierConfig {
    /// Configuration name (`metadata.name`), for logs.
    pub name: String,
    /// Repository named in the delivery config. Issues are filed against the
    /// repository of each event; this one is reported at startup.
    pub configured_repo: RepositoryId,
    pub filter: EventFilter,
    pub renderer: MessageRenderer,
}

impl NotifierConfig {
    /// Builds the configuration from a validated document and the template
    /// source the host loaded for it.
    pub fn from_document(
        document: &NotifierDocument,
        template_source: impl Into<String>,
    ) -> Result<Self, SetupError> {
        Ok(Self {
            name: document.metadata.name.clone(),
            configured_repo: document.repository()?,
            filter: EventFilter::compile(&document.spec.notification.filter)?,
            renderer: MessageRenderer::compile(template_source)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why a notification was dropped without any HTTP call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    FilterRejected,
    RepositoryUnresolved,
}

/// Result of a delivered notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub repo: RepositoryId,
    pub committer: CommitterResolution,
    pub dispatch: DispatchReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    Skipped(SkipReason),
    Delivered(DeliveryReport),
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Sends GitHub issue notifications for build events.
///
/// Safe to share across concurrent notifications behind an [`Arc`]: all state
/// is read-only after setup.
pub struct Notifier {
    config: NotifierConfig,
    api: Arc<dyn GitHubApi>,
    bindings: Arc<dyn BindingResolver>,
    dispatcher: IssueDispatcher,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Notifier {
    pub fn new(
        config: NotifierConfig,
        api: Arc<dyn GitHubApi>,
        bindings: Arc<dyn BindingResolver>,
        overrides: Arc<dyn OverrideStore>,
    ) -> Self {
        let dispatcher = IssueDispatcher::new(api.clone(), overrides);
        Self {
            config,
            api,
            bindings,
            dispatcher,
        }
    }

    /// Builds a notifier from a configuration document.
    ///
    /// Compiles the filter and template, fetches the token named by
    /// `githubToken.secretRef`, and hands it to `make_api` to construct the
    /// GitHub client. Every failure is fatal.
    pub async fn setup<F>(
        document: &NotifierDocument,
        template_source: impl Into<String>,
        secrets: &dyn SecretGetter,
        make_api: F,
        overrides: Arc<dyn OverrideStore>,
    ) -> Result<Self, SetupError>
    where
        F: FnOnce(String) -> Result<Arc<dyn GitHubApi>, SetupError>,
    {
        let config = NotifierConfig::from_document(document, template_source)?;
        let resource = document.token_secret_resource()?;
        let token = secrets
            .get_secret(resource)
            .await
            .map_err(SetupError::Secret)?;
        let api = make_api(token)?;
        let bindings = Arc::new(ParamBindingResolver::new(
            document.spec.notification.params.clone(),
        ));
        info!(
            notifier = %config.name,
            repo = %config.configured_repo,
            filter = config.filter.expression().unwrap_or("<accept all>"),
            "notifier set up"
        );
        Ok(Self::new(config, api, bindings, overrides))
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    /// Runs the pipeline for one event.
    ///
    /// Mutates `event`: sets `GH_COMMITTER_LOGIN` (empty when unresolved) and
    /// rewrites `log_url` with tracking parameters.
    pub async fn send_notification(
        &self,
        event: &mut BuildEvent,
        cancel: &CancellationToken,
    ) -> Result<NotificationOutcome, NotifyError> {
        let span = info_span!(
            "notification",
            notification_id = %NotificationId::new_random(),
            build_id = %event.id,
        );
        self.run(event, cancel).instrument(span).await
    }

    async fn run(
        &self,
        event: &mut BuildEvent,
        cancel: &CancellationToken,
    ) -> Result<NotificationOutcome, NotifyError> {
        if !self.config.filter.apply(event) {
            debug!(status = %event.status, "not sending notification for event");
            return Ok(NotificationOutcome::Skipped(SkipReason::FilterRejected));
        }

        let Some(repo) = crate::resolve_repo(event) else {
            warn!("could not determine GitHub repository from build, skipping notification");
            return Ok(NotificationOutcome::Skipped(SkipReason::RepositoryUnresolved));
        };
        info!(%repo, status = %event.status, "sending GitHub issue notification");

        let committer = match resolve_committer(self.api.as_ref(), event, &repo, cancel).await {
            Ok(resolution) => resolution,
            Err(CommitterError::Cancelled) => {
                event.set_substitution(substitution_keys::COMMITTER_LOGIN, "");
                return Err(NotifyError::Cancelled);
            }
            Err(err) => {
                warn!(error = %err, "failed to get committer from commit ref");
                CommitterResolution::Unresolved
            }
        };
        event.set_substitution(substitution_keys::COMMITTER_LOGIN, committer.identity());

        let resolved = self.bindings.resolve(event);
        for failure in &resolved.failures {
            warn!(error = %failure, "failed to resolve binding, using empty value");
        }
        let params = resolved.params;

        let log_url = add_utm_params(&event.log_url).map_err(|source| {
            NotifyError::LogUrl {
                log_url: event.log_url.clone(),
                source,
            }
        })?;
        event.log_url = log_url;

        let issue = self.config.renderer.render_issue(event, &params)?;
        let dispatch = self.dispatcher.dispatch(&repo, &issue, cancel).await?;
        info!(
            create_status = dispatch.create_status,
            close = ?dispatch.close,
            "notification delivered"
        );

        Ok(NotificationOutcome::Delivered(DeliveryReport {
            repo,
            committer,
            dispatch,
        }))
    }
}
