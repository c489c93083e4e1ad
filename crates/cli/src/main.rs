//! Build notifier entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Parse configuration**: read the notifier YAML document and its issue
//!    template.
//! 2. **Wire observability**: install `tracing-subscriber` with an `EnvFilter`,
//!    plain or JSON output, and an optional OpenTelemetry OTLP exporter.
//! 3. **Construct infrastructure**: resolve the GitHub token through
//!    [`secrets::LocalSecretGetter`], build the [`github::GithubClient`], and
//!    inject both into [`pipeline::Notifier`].
//! 4. **Select run mode**:
//!    - `--setup-check`: stop after setup.
//!    - `--smoketest`: push one synthetic `SUCCESS` build through the pipeline.
//!    - default: serve the Pub/Sub push receiver until Ctrl-C / SIGTERM.

mod observability;
mod secrets;
mod settings;

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use github::GithubClient;
use listener::ListenerState;
use pipeline::{
    BuildEvent, BuildStatus, CancellationToken, EnvOverrides, GitHubApi, Notifier, SetupError,
};
use tokio::net::TcpListener;
use tracing::info;

use crate::secrets::LocalSecretGetter;

#[derive(Debug, Parser)]
#[command(name = "githubissues-notifier")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Files GitHub issues for Cloud Build status messages", long_about = None)]
struct Cli {
    /// Notifier configuration document (YAML)
    #[arg(long, env = "CONFIG_PATH")]
    config: PathBuf,

    /// Port for the Pub/Sub push receiver
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Deadline for a single notification, in seconds
    #[arg(long, env = "NOTIFICATION_TIMEOUT_SECS", default_value_t = 30)]
    notification_timeout_secs: u64,

    /// Emit JSON-formatted log lines
    #[arg(long, env = "JSON_LOGS")]
    json_logs: bool,

    /// OTLP gRPC endpoint for span export
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,

    /// Run setup (including secret retrieval) and exit
    #[arg(long, conflicts_with = "smoketest")]
    setup_check: bool,

    /// Send one synthetic SUCCESS build through the pipeline and exit
    #[arg(long)]
    smoketest: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _telemetry = observability::init(cli.json_logs, cli.otlp_endpoint.as_deref())?;
    run(cli).await
}

async fn run(cli: Cli) -> Result<()> {
    let loaded = settings::load(&cli.config)?;
    let secrets = LocalSecretGetter::new(loaded.base_dir.clone());
    let notifier = Notifier::setup(
        &loaded.document,
        loaded.template_source,
        &secrets,
        github_api,
        Arc::new(EnvOverrides),
    )
    .await
    .context("notifier setup failed")?;

    if cli.setup_check {
        info!(notifier = %notifier.config().name, "setup check passed");
        return Ok(());
    }
    if cli.smoketest {
        return smoketest(&notifier).await;
    }

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, cli.port));
    let tcp = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind push receiver on {addr}"))?;
    let state = ListenerState::new(
        Arc::new(notifier),
        Duration::from_secs(cli.notification_timeout_secs),
    );
    listener::serve(tcp, state, listener::shutdown_signal())
        .await
        .context("push receiver exited unexpectedly")?;
    Ok(())
}

fn github_api(token: String) -> Result<Arc<dyn GitHubApi>, SetupError> {
    let client = GithubClient::new(&token).map_err(|err| SetupError::Client {
        message: err.to_string(),
    })?;
    Ok(Arc::new(client))
}

async fn smoketest(notifier: &Notifier) -> Result<()> {
    let mut event = BuildEvent {
        id: "smoketest".to_string(),
        status: BuildStatus::Success,
        ..BuildEvent::default()
    };
    let outcome = notifier
        .send_notification(&mut event, &CancellationToken::new())
        .await
        .context("smoketest notification failed")?;
    info!(?outcome, "smoketest finished");
    Ok(())
}
