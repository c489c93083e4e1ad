//! Error types for the notification domain, one enum per failure domain.
//!
//! | Type | Failure domain | Effect on a notification |
//! |------|----------------|--------------------------|
//! | [`SetupError`] | configuration | fatal at startup |
//! | [`CommitterError`] | committer lookup | warning; identity left empty |
//! | [`BindingError`] | binding resolution | warning; bindings left empty |
//! | [`NotifyError`] | render / transport / cancellation | aborts the notification |
//!
//! Skip conditions are not errors at all; see [`crate::SkipReason`].

use thiserror::Error;

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// A request to the GitHub API could not be completed at the transport level
/// (connection failure, TLS failure, malformed request).
///
/// A non-2xx HTTP status is *not* a transport error; adapters return it as an
/// [`crate::ApiReply`] and the domain decides what it means.
#[derive(Debug, Error)]
#[error("{operation} request to {url} failed")]
pub struct TransportError {
    /// Short label for the call (e.g. `"create issue"`).
    pub operation: &'static str,
    /// Target URL of the failed request.
    pub url: String,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl TransportError {
    /// Wraps an underlying client error.
    pub fn new(
        operation: &'static str,
        url: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            operation,
            url: url.into(),
            source: source.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

/// Configuration problems detected while building a [`crate::Notifier`].
///
/// The notifier never starts with an invalid configuration.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The configuration document is not valid YAML or does not match the schema.
    #[error("failed to parse notifier configuration")]
    Document(#[source] serde_yaml::Error),

    /// The document declares an unsupported `apiVersion` or `kind`.
    #[error("unsupported notifier document: expected {expected}, got {found:?}")]
    UnsupportedDocument {
        expected: &'static str,
        found: String,
    },

    /// A required field is missing or malformed.
    #[error("invalid notifier configuration field `{field}`: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },

    /// The filter expression does not compile.
    #[error("failed to compile filter expression")]
    Filter(#[source] minijinja::Error),

    /// The issue template does not compile.
    #[error("failed to parse issue template")]
    Template(#[source] minijinja::Error),

    /// `githubToken.secretRef` names a secret that is not declared under `secrets`.
    #[error("no secret named {secret_ref:?} is declared in the configuration")]
    SecretNotDeclared { secret_ref: String },

    /// The secret store could not supply the token.
    #[error("failed to get token secret")]
    Secret(#[source] SecretError),

    /// The GitHub client could not be constructed.
    #[error("failed to construct GitHub client: {message}")]
    Client { message: String },
}

/// A secret could not be retrieved from the host's secret store.
#[derive(Debug, Error)]
pub enum SecretError {
    /// The resource name is not in a form the store understands.
    #[error("unsupported secret resource {resource:?}")]
    UnsupportedResource { resource: String },

    /// The secret exists but is empty.
    #[error("secret {resource:?} is empty")]
    Empty { resource: String },

    /// The store failed to read the secret.
    #[error("failed to read secret {resource:?}")]
    Unavailable {
        resource: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

// ---------------------------------------------------------------------------
// Best-effort failures
// ---------------------------------------------------------------------------

/// The committer identity for the triggering ref could not be looked up.
#[derive(Debug, Error)]
pub enum CommitterError {
    /// The event has no `REF_NAME` substitution.
    #[error("no ref name found in substitutions")]
    MissingRef,

    /// The lookup endpoint answered with a status other than `200 OK`.
    #[error("got a non-OK response status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// The lookup response body is not a JSON object.
    #[error("failed to decode lookup response from {url}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("committer lookup cancelled")]
    Cancelled,
}

/// Template bindings could not be resolved for an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    /// A `$(build.<field>)` reference names a field the event does not expose.
    #[error("binding {param:?} references unknown build field {field:?}")]
    UnknownField { param: String, field: String },

    /// A `$(build.substitutions.<KEY>)` reference names an absent substitution.
    #[error("binding {param:?} references missing substitution {key:?}")]
    MissingSubstitution { param: String, key: String },
}

// ---------------------------------------------------------------------------
// Aborting failures
// ---------------------------------------------------------------------------

/// Conditions that stop a notification and are surfaced to the caller.
///
/// Side effects that already happened (e.g. an issue created before a
/// cancellation) are not rolled back.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The build's log URL could not be tagged with tracking parameters.
    #[error("failed to add UTM params to log URL {log_url:?}")]
    LogUrl {
        log_url: String,
        #[source]
        source: url::ParseError,
    },

    /// Template execution failed (e.g. undefined field access).
    #[error("failed to render issue template")]
    Render(#[source] minijinja::Error),

    /// The rendered template is not a valid issue document.
    #[error("rendered issue template is not a valid issue payload")]
    Payload(#[source] serde_json::Error),

    /// The create-issue call failed at the transport level.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The caller cancelled the notification.
    #[error("notification cancelled")]
    Cancelled,
}
