#![doc = include_str!("../README.md")]

mod server;

use anyhow::Context;
use clap::Parser;
use server::commands;
use server::config::{CliArgs, Command, ServerConfig};
use server::telemetry::init_telemetry;
use shortno::{ShortnoPool, SqliteStore};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry(config.log_format)?;
    log_startup_info(&config);

    let res = dispatch(config).await;
    if let Err(e) = &res {
        tracing::error!(error = ?e, "Command failed");
    }

    providers.shutdown();
    res
}

async fn dispatch(config: ServerConfig) -> anyhow::Result<()> {
    let store = SqliteStore::open(&config.db)
        .with_context(|| format!("failed to open {}", config.db.display()))?;
    let pool = ShortnoPool::new(Arc::new(store), config.pool)?;
    let mut stdout = std::io::stdout();

    match config.command {
        Command::Run => commands::run(&pool, shutdown_signal()).await,
        Command::Allocate => {
            let token = CancellationToken::new();
            let guard = token.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                guard.cancel();
            });
            commands::allocate(&pool, &token, &mut stdout).await
        }
        Command::MarkUsed { value, owner } => {
            commands::mark_used(&pool, &value, &owner, &mut stdout).await
        }
        Command::Stats => commands::stats(&pool, &mut stdout).await,
        Command::Refill => commands::refill(&pool, &mut stdout).await,
    }
}

fn log_startup_info(config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::debug!("Starting with full config: {:#?}", config);
    } else {
        tracing::debug!(
            db = %config.db.display(),
            command = ?config.command,
            "Starting"
        );
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }
}
