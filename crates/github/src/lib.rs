//! GitHub infrastructure adapter for the build notifier.
//!
//! Implements [`pipeline::GitHubApi`] with [`reqwest`]. Exactly three
//! endpoints are used:
//!
//! | Call | Request |
//! |------|---------|
//! | create issue | `POST {endpoint}/{owner}/{name}/issues` |
//! | look up ref | `GET {endpoint}/{owner}/{name}/commits/{ref}` or `.../releases/tags/{ref}` |
//! | close issue | `PATCH {issue_url}` with `{"state":"closed"}` |
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules. It attaches
//! headers, performs one attempt per call, and returns the raw status and
//! body; the [`pipeline`] crate decides what a status means.

mod client;

pub use client::{ClientError, GithubClient, ACCEPT_HEADER, GITHUB_API_ENDPOINT, USER_AGENT};
