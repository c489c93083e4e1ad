//! End-to-end pipeline behaviour against the in-memory GitHub fake.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use pipeline::fakes::{RecordedCall, RecordingGitHubApi, StaticSecretGetter};
use pipeline::{
    substitution_keys, ApiReply, BindingError, BindingResolver, BuildEvent, BuildStatus,
    CancellationToken, CloseOutcome, CommitterResolution, EventFilter, GitHubApi, MapOverrides,
    MessageRenderer, NotificationOutcome, Notifier, NotifierConfig, NotifierDocument,
    NotifyError, ParamBindingResolver, RepositoryId, ResolvedBindings, SetupError, SkipReason,
};
use serde_json::json;

const TEMPLATE: &str = r#"{
  "title": {{ ("[" ~ build.status ~ "] build " ~ build.id) | tojson }},
  "body": {{ ("by " ~ build.substitutions.GH_COMMITTER_LOGIN ~ " logs " ~ build.logUrl) | tojson }}
}"#;

const ISSUE_URL: &str = "https://api.github.com/repos/acme/widgets/issues/5";

fn config(filter: &str) -> NotifierConfig {
    NotifierConfig {
        name: "test".into(),
        configured_repo: RepositoryId::parse("acme/widgets").expect("repo"),
        filter: EventFilter::compile(filter).expect("filter"),
        renderer: MessageRenderer::compile(TEMPLATE).expect("template"),
    }
}

fn notifier(api: &Arc<RecordingGitHubApi>, overrides: MapOverrides) -> Notifier {
    notifier_with_bindings(api, overrides, Arc::new(ParamBindingResolver::default()))
}

fn notifier_with_bindings(
    api: &Arc<RecordingGitHubApi>,
    overrides: MapOverrides,
    bindings: Arc<dyn BindingResolver>,
) -> Notifier {
    Notifier::new(
        config(r#"build.status == "FAILURE""#),
        api.clone(),
        bindings,
        Arc::new(overrides),
    )
}

fn failing_build() -> BuildEvent {
    let mut event = BuildEvent {
        id: "b-42".into(),
        status: BuildStatus::Failure,
        log_url: "https://console.example/builds/b-42".into(),
        ..BuildEvent::default()
    };
    event.set_substitution(substitution_keys::REPO_FULL_NAME, "acme/widgets");
    event.set_substitution(substitution_keys::REF_NAME, "main");
    event
}

fn open_issue() -> ApiReply {
    ApiReply::new(201, json!({"state": "open", "url": ISSUE_URL}).to_string())
}

fn commit_by(login: &str) -> ApiReply {
    ApiReply::new(
        200,
        json!({"author": {"login": login, "type": "User"}, "commit": {"committer": {"name": "GitHub"}}})
            .to_string(),
    )
}

async fn send(notifier: &Notifier, event: &mut BuildEvent) -> Result<NotificationOutcome, NotifyError> {
    notifier.send_notification(event, &CancellationToken::new()).await
}

#[tokio::test]
async fn filter_rejection_makes_no_calls() {
    let api = Arc::new(RecordingGitHubApi::new());
    let mut event = failing_build();
    event.status = BuildStatus::Success;

    let outcome = send(&notifier(&api, MapOverrides::new()), &mut event).await.expect("skip");

    assert_eq!(outcome, NotificationOutcome::Skipped(SkipReason::FilterRejected));
    assert!(api.calls().is_empty());
    assert!(!event.substitutions.contains_key(substitution_keys::COMMITTER_LOGIN));
}

#[tokio::test]
async fn missing_repository_makes_no_calls_and_no_error() {
    let api = Arc::new(RecordingGitHubApi::new());
    let mut event = failing_build();
    event.substitutions.remove(substitution_keys::REPO_FULL_NAME);

    let outcome = send(&notifier(&api, MapOverrides::new()), &mut event).await.expect("skip");

    assert_eq!(
        outcome,
        NotificationOutcome::Skipped(SkipReason::RepositoryUnresolved)
    );
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn branch_build_creates_then_closes_issue() {
    let api = Arc::new(
        RecordingGitHubApi::new()
            .with_lookup_reply(commit_by("octocat"))
            .with_create_reply(open_issue()),
    );
    let mut event = failing_build();

    let outcome = send(&notifier(&api, MapOverrides::new()), &mut event).await.expect("deliver");

    let calls = api.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(
        calls[0],
        RecordedCall::LookupRef {
            path: "acme/widgets/commits/main".into()
        }
    );
    let RecordedCall::CreateIssue { repo, request } = &calls[1] else {
        panic!("expected create call, got {:?}", calls[1]);
    };
    assert_eq!(repo, "acme/widgets");
    assert_eq!(request.title, "[FAILURE] build b-42");
    assert!(request.body.starts_with("by octocat logs https://console.example/builds/b-42?"));
    assert!(request.body.contains("utm_medium=http"));
    assert_eq!(calls[2], RecordedCall::CloseIssue { url: ISSUE_URL.into() });

    let NotificationOutcome::Delivered(report) = outcome else {
        panic!("expected delivery");
    };
    assert_eq!(report.committer, CommitterResolution::AuthorLogin("octocat".into()));
    assert_eq!(report.dispatch.close, CloseOutcome::CloseAttempted { status: 200 });
    assert_eq!(
        event.substitution(substitution_keys::COMMITTER_LOGIN),
        Some("octocat")
    );
}

#[tokio::test]
async fn override_true_leaves_issue_open() {
    let api = Arc::new(RecordingGitHubApi::new().with_create_reply(open_issue()));
    let overrides = MapOverrides::new().with("DISABLE_AUTO_CLOSE__acme/widgets", "true");
    let mut event = failing_build();

    send(&notifier(&api, overrides), &mut event).await.expect("deliver");

    assert_eq!(api.create_calls(), 1);
    assert_eq!(api.close_calls(), 0);
}

#[tokio::test]
async fn override_false_still_closes() {
    let api = Arc::new(RecordingGitHubApi::new().with_create_reply(open_issue()));
    let overrides = MapOverrides::new().with("DISABLE_AUTO_CLOSE__acme/widgets", "false");
    let mut event = failing_build();

    send(&notifier(&api, overrides), &mut event).await.expect("deliver");

    assert_eq!(api.close_calls(), 1);
}

#[tokio::test]
async fn tag_build_queries_release_endpoint_only() {
    let api = Arc::new(RecordingGitHubApi::new().with_lookup_reply(commit_by("releaser")));
    let mut event = failing_build();
    event.set_substitution(substitution_keys::REF_NAME, "v2.0.0");
    event.set_substitution(substitution_keys::TAG_NAME, "v2.0.0");

    send(&notifier(&api, MapOverrides::new()), &mut event).await.expect("deliver");

    let lookups: Vec<_> = api
        .calls()
        .into_iter()
        .filter(|call| matches!(call, RecordedCall::LookupRef { .. }))
        .collect();
    assert_eq!(
        lookups,
        vec![RecordedCall::LookupRef {
            path: "acme/widgets/releases/tags/v2.0.0".into()
        }]
    );
}

#[tokio::test]
async fn committer_lookup_failure_still_delivers_with_empty_identity() {
    let api = Arc::new(
        RecordingGitHubApi::new()
            .with_lookup_reply(ApiReply::new(404, r#"{"message":"Not Found"}"#)),
    );
    let mut event = failing_build();

    let outcome = send(&notifier(&api, MapOverrides::new()), &mut event).await.expect("deliver");

    assert!(matches!(outcome, NotificationOutcome::Delivered(_)));
    assert_eq!(api.create_calls(), 1);
    assert_eq!(
        event.substitutions.get(substitution_keys::COMMITTER_LOGIN).map(String::as_str),
        Some("")
    );
}

#[tokio::test]
async fn committer_transport_failure_is_a_warning() {
    let api = Arc::new(RecordingGitHubApi::new().failing_lookup());
    let mut event = failing_build();

    send(&notifier(&api, MapOverrides::new()), &mut event).await.expect("deliver");

    assert_eq!(api.create_calls(), 1);
    assert_eq!(
        event.substitutions.get(substitution_keys::COMMITTER_LOGIN).map(String::as_str),
        Some("")
    );
}

#[tokio::test]
async fn missing_ref_name_skips_lookup_but_delivers() {
    let api = Arc::new(RecordingGitHubApi::new());
    let mut event = failing_build();
    event.substitutions.remove(substitution_keys::REF_NAME);

    send(&notifier(&api, MapOverrides::new()), &mut event).await.expect("deliver");

    assert_eq!(api.lookup_calls(), 0);
    assert_eq!(api.create_calls(), 1);
}

#[tokio::test]
async fn failing_binding_resolver_still_delivers() {
    struct Broken;
    impl BindingResolver for Broken {
        fn resolve(&self, _: &BuildEvent) -> ResolvedBindings {
            ResolvedBindings {
                params: BTreeMap::new(),
                failures: vec![BindingError::UnknownField {
                    param: "x".into(),
                    field: "nope".into(),
                }],
            }
        }
    }

    let api = Arc::new(RecordingGitHubApi::new());
    let mut event = failing_build();

    send(
        &notifier_with_bindings(&api, MapOverrides::new(), Arc::new(Broken)),
        &mut event,
    )
    .await
    .expect("deliver");

    assert_eq!(api.create_calls(), 1);
}

#[tokio::test]
async fn unresolvable_param_renders_empty_while_others_survive() {
    let api = Arc::new(RecordingGitHubApi::new());
    let renderer = MessageRenderer::compile(
        r#"{"title": {{ ("branch=" ~ params.branch ~ " tag=" ~ params.tag) | tojson }}, "body": ""}"#,
    )
    .expect("template");
    let params = BTreeMap::from([
        ("branch".to_string(), "$(build.substitutions.BRANCH_NAME)".to_string()),
        ("tag".to_string(), "$(build.substitutions.TAG_NAME)".to_string()),
    ]);
    let notifier = Notifier::new(
        NotifierConfig {
            renderer,
            ..config(r#"build.status == "FAILURE""#)
        },
        api.clone(),
        Arc::new(ParamBindingResolver::new(params)),
        Arc::new(MapOverrides::new()),
    );
    let mut event = failing_build();
    event.set_substitution("BRANCH_NAME", "main");

    send(&notifier, &mut event).await.expect("deliver");

    let created = api
        .calls()
        .into_iter()
        .find_map(|call| match call {
            RecordedCall::CreateIssue { request, .. } => Some(request),
            _ => None,
        })
        .expect("create call");
    assert_eq!(created.title, "branch=main tag=");
}

#[tokio::test]
async fn malformed_log_url_aborts_before_create() {
    let api = Arc::new(RecordingGitHubApi::new());
    let mut event = failing_build();
    event.log_url = "not a url".into();

    let err = send(&notifier(&api, MapOverrides::new()), &mut event)
        .await
        .expect_err("abort");

    assert!(matches!(err, NotifyError::LogUrl { .. }));
    assert_eq!(api.create_calls(), 0);
}

#[tokio::test]
async fn render_failure_aborts_before_create() {
    let api = Arc::new(RecordingGitHubApi::new());
    let notifier = Notifier::new(
        NotifierConfig {
            renderer: MessageRenderer::compile(r#"{"title": "{{ params.missing }}", "body": ""}"#)
                .expect("template"),
            ..config("")
        },
        api.clone(),
        Arc::new(ParamBindingResolver::default()),
        Arc::new(MapOverrides::new()),
    );
    let mut event = failing_build();

    let err = send(&notifier, &mut event).await.expect_err("abort");

    assert!(matches!(err, NotifyError::Render(_)));
    assert_eq!(api.create_calls(), 0);
}

#[tokio::test]
async fn create_transport_error_aborts() {
    let api = Arc::new(RecordingGitHubApi::new().failing_create());
    let mut event = failing_build();

    let err = send(&notifier(&api, MapOverrides::new()), &mut event)
        .await
        .expect_err("abort");

    assert!(matches!(err, NotifyError::Transport(_)));
    assert_eq!(api.close_calls(), 0);
}

#[tokio::test]
async fn non_ok_create_is_best_effort() {
    let api = Arc::new(
        RecordingGitHubApi::new().with_create_reply(ApiReply::new(422, r#"{"message":"Validation Failed"}"#)),
    );
    let mut event = failing_build();

    let outcome = send(&notifier(&api, MapOverrides::new()), &mut event).await.expect("best effort");

    let NotificationOutcome::Delivered(report) = outcome else {
        panic!("expected delivery report");
    };
    assert_eq!(report.dispatch.create_status, 422);
    assert_eq!(report.dispatch.close, CloseOutcome::NotCreated);
}

#[tokio::test]
async fn cancellation_aborts_in_flight_create() {
    let api = Arc::new(RecordingGitHubApi::new().hanging_create());
    let notifier = notifier(&api, MapOverrides::new());
    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });
    let mut event = failing_build();

    let err = notifier
        .send_notification(&mut event, &cancel)
        .await
        .expect_err("cancelled");

    assert!(matches!(err, NotifyError::Cancelled));
    assert_eq!(api.create_calls(), 1);
    assert_eq!(api.close_calls(), 0);
}

#[tokio::test]
async fn pre_cancelled_token_still_records_empty_committer() {
    let api = Arc::new(RecordingGitHubApi::new());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut event = failing_build();

    let err = notifier(&api, MapOverrides::new())
        .send_notification(&mut event, &cancel)
        .await
        .expect_err("cancelled");

    assert!(matches!(err, NotifyError::Cancelled));
    assert!(api.calls().is_empty());
    assert_eq!(
        event.substitutions.get(substitution_keys::COMMITTER_LOGIN).map(String::as_str),
        Some("")
    );
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

const DOCUMENT: &str = r#"
apiVersion: cloud-build-notifiers/v1
kind: GitHubIssuesNotifier
metadata:
  name: widgets
spec:
  notification:
    filter: build.status == "FAILURE"
    params:
      branch: $(build.substitutions.REF_NAME)
    delivery:
      githubRepo: acme/widgets
      githubToken:
        secretRef: github-token
    template:
      content: '{"title": "{{ params.branch }}", "body": "{{ build.id }}"}'
  secrets:
    - name: github-token
      value: env:GITHUB_TOKEN
"#;

#[tokio::test]
async fn setup_hands_secret_to_client_factory() {
    let document = NotifierDocument::from_yaml(DOCUMENT).expect("document");
    let secrets = StaticSecretGetter::new().with("env:GITHUB_TOKEN", "s3cret");
    let api = Arc::new(RecordingGitHubApi::new());
    let factory_api = api.clone();
    let mut seen_token = None;

    let notifier = Notifier::setup(
        &document,
        r#"{"title": "{{ params.branch }}", "body": "{{ build.id }}"}"#,
        &secrets,
        |token| {
            seen_token = Some(token);
            Ok(factory_api as Arc<dyn GitHubApi>)
        },
        Arc::new(MapOverrides::new()),
    )
    .await
    .expect("setup");

    assert_eq!(seen_token.as_deref(), Some("s3cret"));
    assert_eq!(notifier.config().name, "widgets");

    let mut event = failing_build();
    send(&notifier, &mut event).await.expect("deliver");
    let calls = api.calls();
    let Some(RecordedCall::CreateIssue { request, .. }) = calls.get(1) else {
        panic!("expected create call, got {calls:?}");
    };
    assert_eq!(request.title, "main");
    assert_eq!(request.body, "b-42");
}

#[tokio::test]
async fn setup_fails_when_secret_is_unavailable() {
    let document = NotifierDocument::from_yaml(DOCUMENT).expect("document");
    let result = Notifier::setup(
        &document,
        "{}",
        &StaticSecretGetter::new(),
        |_| Ok(Arc::new(RecordingGitHubApi::new()) as Arc<dyn GitHubApi>),
        Arc::new(MapOverrides::new()),
    )
    .await;

    assert!(matches!(result, Err(SetupError::Secret(_))));
}

#[tokio::test]
async fn setup_fails_on_bad_template() {
    let document = NotifierDocument::from_yaml(DOCUMENT).expect("document");
    let result = Notifier::setup(
        &document,
        "{{ unterminated",
        &StaticSecretGetter::new().with("env:GITHUB_TOKEN", "s3cret"),
        |_| Ok(Arc::new(RecordingGitHubApi::new()) as Arc<dyn GitHubApi>),
        Arc::new(MapOverrides::new()),
    )
    .await;

    assert!(matches!(result, Err(SetupError::Template(_))));
}
