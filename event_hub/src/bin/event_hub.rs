//! Event hub binary: serve the HTTP API or watch a running hub.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use event_hub::{
    router, AppState, ClientView, EventLedger, HandlerRegistry, HttpSnapshotSource, HubConfig,
    IngestionGateway, Reconciler,
};

#[derive(Parser, Debug)]
#[command(name = "event_hub")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the ingestion and query API
    Serve {
        /// Address to bind, e.g. 127.0.0.1:9002
        #[arg(long)]
        bind: Option<String>,
    },

    /// Mirror a running hub into a local view and log its counts
    Watch {
        /// Base URL of the hub
        #[arg(long)]
        url: Option<String>,

        /// Poll interval in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config =
        HubConfig::load_or_default(cli.config.as_deref()).context("failed to load config")?;

    match cli.command {
        Command::Serve { bind } => serve(config, bind).await,
        Command::Watch { url, interval_ms } => watch(config, url, interval_ms).await,
    }
}

async fn serve(config: HubConfig, bind: Option<String>) -> Result<()> {
    let ledger = Arc::new(EventLedger::with_capacity(config.ledger.capacity));
    let handlers = Arc::new(HandlerRegistry::new());
    let gateway = Arc::new(IngestionGateway::new(ledger, handlers));
    let state = AppState::new(gateway).with_stats(config.stats.engine());

    let addr = bind.unwrap_or(config.server.bind);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(addr = %addr, capacity = config.ledger.capacity, "event hub listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("event hub stopped");
    Ok(())
}

async fn watch(config: HubConfig, url: Option<String>, interval_ms: Option<u64>) -> Result<()> {
    let base_url = url.unwrap_or(config.reconciler.base_url.clone());
    let interval = interval_ms
        .map(|ms| Duration::from_millis(ms.max(1)))
        .unwrap_or_else(|| config.reconciler.interval());

    let view = Arc::new(Mutex::new(ClientView::with_capacity(config.ledger.capacity)));
    let cancel = CancellationToken::new();
    let reconciler = Reconciler::new(HttpSnapshotSource::new(base_url.clone()), Arc::clone(&view))
        .with_interval(interval);

    info!(url = %base_url, interval_ms = interval.as_millis() as u64, "watching event hub");
    let handle = reconciler.spawn(cancel.clone());

    let mut report = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = shutdown_signal() => break,
            _ = report.tick() => {
                let view = view.lock();
                info!(
                    events = view.events().len(),
                    attacks = view.attack_count(),
                    hits = view.hit_count(),
                    dashes = view.dash_count(),
                    success_rate_by_user_formula = ?view.success_rate_by_user_formula(),
                    "client view"
                );
            }
        }
    }

    cancel.cancel();
    handle.await.context("reconciler task failed")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
