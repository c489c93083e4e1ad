//! Build event source infrastructure.
//!
//! Receives Cloud Build status messages from a Pub/Sub push subscription and
//! hands each decoded [`pipeline::BuildEvent`] to a shared
//! [`pipeline::Notifier`].
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `POST /` | Pub/Sub push endpoint; body is a push envelope |
//! | `GET /healthz` | Liveness probe |
//!
//! Push responses follow Pub/Sub redelivery semantics: `200` acknowledges the
//! message (delivered or deliberately skipped), `400` acknowledges a message
//! that can never be decoded, and `500` asks Pub/Sub to retry after an aborted
//! notification.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Envelope decoding, HTTP routing, and per-request
//! deadlines live here. The [`pipeline`] crate sees only a `BuildEvent` and a
//! `CancellationToken`.

mod envelope;
mod server;

pub use envelope::{EnvelopeError, PushEnvelope, PushMessage};
pub use server::{router, serve, shutdown_signal, ListenerError, ListenerState};
