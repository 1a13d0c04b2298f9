use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use cc_domain::config::{Config, ConfigSeverity};
use cc_gateway::api;
use cc_gateway::state::AppState;
use cc_model::{AdviceModel, HttpAdviceModel};
use cc_telephony::HttpDialer;

/// How often process-wide state (limiter windows, cooldowns, idle worker
/// mailboxes) is pruned.
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "callcoach", about = "Real-time anti-scam call coach")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the gateway (default).
    Serve,
    /// Print the version and exit.
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to serve when no subcommand is given.
        None | Some(Command::Serve) => {
            init_tracing();
            run_server(Arc::new(Config::from_env())).await
        }
        Some(Command::Version) => {
            println!("callcoach {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Initialize structured JSON tracing (only for the `serve` command).
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,cc_gateway=debug")),
        )
        .json()
        .init();
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("callcoach starting");

    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── External adapters ────────────────────────────────────────────
    let model = Arc::new(
        HttpAdviceModel::from_config(&config.model).context("initializing model scorer")?,
    );
    if !model.is_configured() {
        tracing::warn!("model scorer disabled — coaching runs on the heuristic alone");
    }
    let dialer =
        Arc::new(HttpDialer::from_config(&config.provider).context("initializing dialer")?);

    // ── State + background pruner ────────────────────────────────────
    let state = AppState::build(config.clone(), model, dialer).context("building app state")?;
    spawn_pruner(state.clone());

    // ── Serve ────────────────────────────────────────────────────────
    let app = api::router()
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app).await.context("server exited")?;
    Ok(())
}

/// Periodically drop expired limiter windows, spent cooldowns, and worker
/// mailboxes whose sessions are gone.
fn spawn_pruner(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            state.limiter.prune(Duration::from_secs(600));
            state.cooldowns.prune();
            state.workers.prune();
            tracing::debug!(
                tracked_calls = state.workers.tracked_calls(),
                "background prune pass"
            );
        }
    });
}
