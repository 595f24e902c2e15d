//! HTTP front-end for the Crucible sandboxed compile service
//!
//! This binary wires the execution engine to the network: it loads
//! configuration, starts the sandbox pool (refusing to serve if any slot
//! fails to come up), spawns the per-slot workers, and exposes the
//! submission/result endpoints until a shutdown signal arrives, at which
//! point the pool's containers are removed best-effort.

mod api;

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use crucible_core::{
    CallbackNotifier, CommandRunner, CrucibleConfig, JobDispatcher, JobStore, MemoryJobStore,
    NoopNotifier, ResultNotifier, SandboxPool, ShellCommandRunner, WorkerExecutor,
    WorkspaceManager,
};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Crucible Server - sandboxed Java compile service")]
struct Cli {
    #[clap(long, short, help = "Path to a YAML configuration file")]
    config: Option<PathBuf>,

    #[clap(long, help = "Override the configured bind address")]
    bind_addr: Option<String>,

    #[clap(long, short, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level_filter = cli.log_level.parse().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .init();

    let mut config = CrucibleConfig::load(cli.config.as_deref())?;
    if let Some(bind_addr) = cli.bind_addr {
        config.server.bind_addr = bind_addr;
    }
    log::info!(
        "configuration loaded: {} slots, image {}",
        config.pool.worker_count,
        config.pool.image
    );

    let workspace = WorkspaceManager::new(config.execution.workspace_root.clone());
    workspace.ensure_root().await?;

    let runner: Arc<dyn CommandRunner> =
        Arc::new(ShellCommandRunner::new(config.execution.max_output_chars));
    let pool = Arc::new(SandboxPool::new(&config, runner.clone()));
    pool.initialize().await?;

    let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
    let notifier: Arc<dyn ResultNotifier> = match &config.server.callback_url {
        Some(url) => {
            log::info!("result callbacks enabled: {}", url);
            Arc::new(CallbackNotifier::new(url.clone()))
        }
        None => Arc::new(NoopNotifier),
    };

    let executor = Arc::new(WorkerExecutor::new(
        &config,
        pool.clone(),
        runner.clone(),
        store.clone(),
        notifier,
    ));
    let dispatcher = Arc::new(JobDispatcher::start(
        executor,
        config.pool.worker_count,
        config.pool.queue_depth,
    ));

    let state = api::AppState {
        store,
        dispatcher,
        max_code_chars: config.execution.max_code_chars,
    };
    let router = api::build_router(state);

    let listener = TcpListener::bind(&config.server.bind_addr).await?;
    log::info!("crucible server listening on {}", config.server.bind_addr);

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        log::error!("server failed: {}", e);
    }

    log::info!("shutting down, removing sandbox containers");
    pool.teardown().await;

    log::info!("crucible server shut down gracefully");
    Ok(())
}

/// Resolves when Ctrl+C or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
