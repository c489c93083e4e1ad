//! Core domain for the GitHub issues build notifier.
//!
//! This crate contains the notification delivery pipeline (event filter,
//! repository resolver, committer resolver, message renderer, issue
//! dispatcher), the types they exchange, and the port traits infrastructure
//! crates implement.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate performs no network I/O.
//! It decides *what* calls to make; the `github` crate decides *how*.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`RepositoryId`, `RefName`, etc.) |
//! | [`types`] | `BuildEvent`, issue payloads, raw API replies |
//! | [`errors`] | One error enum per failure domain |
//! | [`ports`] | `GitHubApi`, `SecretGetter`, `BindingResolver`, `OverrideStore` |
//! | [`config`] | Notifier configuration document |
//! | [`filter`] | Event filter expressions |
//! | [`repository`] | Repository resolver |
//! | [`committer`] | Committer lookup and identity priority |
//! | [`bindings`] | Default `params` binding resolver |
//! | [`utm`] | Log URL tracking parameters |
//! | [`render`] | Issue template rendering |
//! | [`dispatch`] | Create / auto-close call sequence |
//! | [`notifier`] | The end-to-end pipeline |
//! | [`cancel`] | Cooperative cancellation |
//! | [`fakes`] | In-memory port implementations for tests |

pub mod bindings;
pub mod cancel;
pub mod committer;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod fakes;
pub mod filter;
pub mod identifiers;
pub mod notifier;
pub mod ports;
pub mod render;
pub mod repository;
pub mod types;
pub mod utm;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use bindings::ParamBindingResolver;
pub use cancel::{CancellationToken, Cancelled};
pub use committer::{resolve_committer, CommitterResolution, LookupResponse, RefLookup};
pub use config::{NotifierDocument, TemplateSource};
pub use dispatch::{auto_close_override_key, CloseOutcome, DispatchReport, IssueDispatcher};
pub use errors::{
    BindingError, CommitterError, NotifyError, SecretError, SetupError, TransportError,
};
pub use filter::EventFilter;
pub use identifiers::{NotificationId, RefName, RepositoryId, SecretRef};
pub use notifier::{DeliveryReport, NotificationOutcome, Notifier, NotifierConfig, SkipReason};
pub use ports::{
    BindingResolver, EnvOverrides, GitHubApi, MapOverrides, OverrideStore, ResolvedBindings,
    SecretGetter,
};
pub use render::MessageRenderer;
pub use repository::resolve_repo;
pub use types::{substitution_keys, ApiReply, BuildEvent, BuildStatus, IssueRequest, IssueResponse};
pub use utm::add_utm_params;
