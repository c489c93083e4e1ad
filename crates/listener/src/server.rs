use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use pipeline::{CancellationToken, NotificationOutcome, Notifier, SkipReason};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::PushEnvelope;

/// Shared state for the push handlers.
#[derive(Debug, Clone)]
pub struct ListenerState {
    notifier: Arc<Notifier>,
    notification_timeout: Duration,
}

impl ListenerState {
    /// `notification_timeout` bounds each notification; when it elapses the
    /// notification's cancellation token fires.
    pub fn new(notifier: Arc<Notifier>, notification_timeout: Duration) -> Self {
        Self {
            notifier,
            notification_timeout,
        }
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }
}

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to resolve listen address")]
    LocalAddr(#[source] std::io::Error),

    #[error("listener server exited unexpectedly")]
    Serve(#[source] std::io::Error),
}

/// Builds the push receiver routes.
pub fn router(state: ListenerState) -> Router {
    Router::new()
        .route("/", post(receive_push))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// Serves [`router`] on `listener` until `shutdown` completes, then drains
/// in-flight requests.
pub async fn serve<S>(
    listener: TcpListener,
    state: ListenerState,
    shutdown: S,
) -> Result<(), ListenerError>
where
    S: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr().map_err(ListenerError::LocalAddr)?;
    info!(
        %addr,
        notifier = %state.notifier().config().name,
        "listening for Pub/Sub push messages"
    );
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ListenerError::Serve)?;
    info!("listener stopped");
    Ok(())
}

/// Completes on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler, waiting for Ctrl-C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("shutdown signal received");
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn receive_push(State(state): State<ListenerState>, body: Bytes) -> (StatusCode, Json<Value>) {
    let envelope = match PushEnvelope::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(err) => return bad_request(err),
    };
    let mut event = match envelope.build_event() {
        Ok(event) => event,
        Err(err) => {
            warn!(message_id = %envelope.message.message_id, error = %err, "dropping push message");
            return bad_request(err);
        }
    };

    let cancel = CancellationToken::new();
    let deadline = arm_deadline(cancel.clone(), state.notification_timeout);
    let result = state.notifier.send_notification(&mut event, &cancel).await;
    deadline.abort();

    match result {
        Ok(NotificationOutcome::Skipped(reason)) => (
            StatusCode::OK,
            Json(json!({ "outcome": "skipped", "reason": skip_reason_code(reason) })),
        ),
        Ok(NotificationOutcome::Delivered(report)) => (
            StatusCode::OK,
            Json(json!({
                "outcome": "delivered",
                "repo": report.repo.to_string(),
                "createStatus": report.dispatch.create_status,
            })),
        ),
        Err(err) => {
            error!(build_id = %event.id, error = %err, "failed to deliver notification");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": err.to_string() })),
            )
        }
    }
}

fn bad_request(err: impl std::fmt::Display) -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": err.to_string() })),
    )
}

fn skip_reason_code(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::FilterRejected => "filter_rejected",
        SkipReason::RepositoryUnresolved => "repository_unresolved",
    }
}

fn arm_deadline(cancel: CancellationToken, timeout: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        warn!(timeout_ms = timeout.as_millis() as u64, "notification deadline elapsed");
        cancel.cancel();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use pipeline::fakes::RecordingGitHubApi;
    use pipeline::{
        EventFilter, MapOverrides, MessageRenderer, NotifierConfig, ParamBindingResolver,
        RepositoryId,
    };
    use tower::ServiceExt;

    fn state_with(api: Arc<RecordingGitHubApi>, timeout: Duration) -> ListenerState {
        let config = NotifierConfig {
            name: "listener-test".into(),
            configured_repo: RepositoryId::parse("acme/widgets").expect("repo"),
            filter: EventFilter::compile(r#"build.status == "FAILURE""#).expect("filter"),
            renderer: MessageRenderer::compile(
                r#"{"title": "Build {{ build.id }}", "body": "{{ build.status }}"}"#,
            )
            .expect("template"),
        };
        let notifier = Notifier::new(
            config,
            api,
            Arc::new(ParamBindingResolver::default()),
            Arc::new(MapOverrides::new()),
        );
        ListenerState::new(Arc::new(notifier), timeout)
    }

    fn push_request(build: Value) -> Request<Body> {
        let envelope = json!({
            "message": {
                "data": STANDARD.encode(build.to_string()),
                "messageId": "1",
            },
            "subscription": "projects/p/subscriptions/cloud-builds",
        });
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(envelope.to_string()))
            .expect("request")
    }

    fn failed_build() -> Value {
        json!({
            "id": "b-1",
            "status": "FAILURE",
            "substitutions": {"REPO_FULL_NAME": "acme/widgets", "REF_NAME": "main"},
        })
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let state = state_with(Arc::new(RecordingGitHubApi::new()), Duration::from_secs(5));
        let request = Request::builder()
            .uri("/healthz")
            .body(Body::empty())
            .expect("request");

        let response = router(state).oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn failed_build_is_delivered() {
        let api = Arc::new(RecordingGitHubApi::new());
        let state = state_with(api.clone(), Duration::from_secs(5));

        let response = router(state)
            .oneshot(push_request(failed_build()))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["outcome"], "delivered");
        assert_eq!(body["repo"], "acme/widgets");
        assert_eq!(body["createStatus"], 201);
        assert_eq!(api.create_calls(), 1);
    }

    #[tokio::test]
    async fn filtered_build_is_acknowledged_without_calls() {
        let api = Arc::new(RecordingGitHubApi::new());
        let state = state_with(api.clone(), Duration::from_secs(5));
        let build = json!({"id": "b-2", "status": "SUCCESS"});

        let response = router(state)
            .oneshot(push_request(build))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["reason"], "filter_rejected");
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn undecodable_envelope_is_bad_request() {
        let state = state_with(Arc::new(RecordingGitHubApi::new()), Duration::from_secs(5));
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from(r#"{"message": {"data": "%%%"}}"#))
            .expect("request");

        let response = router(state).oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_transport_failure_is_server_error() {
        let api = Arc::new(RecordingGitHubApi::new().failing_create());
        let state = state_with(api, Duration::from_secs(5));

        let response = router(state)
            .oneshot(push_request(failed_build()))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn elapsed_deadline_cancels_notification() {
        let api = Arc::new(RecordingGitHubApi::new().hanging_create());
        let state = state_with(api.clone(), Duration::from_millis(50));

        let response = router(state)
            .oneshot(push_request(failed_build()))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.create_calls(), 1);
        assert_eq!(api.close_calls(), 0);
    }
}
