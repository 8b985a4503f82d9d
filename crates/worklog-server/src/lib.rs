//! # worklog-server
//!
//! why: serve the append log to browser clients over plain http
//! relations: uses worklog-storage for the log, worklog-core for entry types
//! what: configuration, http router, startup and graceful shutdown

pub mod config;
pub mod http;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;
use worklog_storage::LogService;

pub use config::{Args, ServerConfig};
pub use http::router;

/// create the log file if needed, then serve until ctrl-c
pub async fn run(config: ServerConfig) -> Result<()> {
    let service = LogService::open(&config.log_file)
        .with_context(|| format!("failed to open log file {}", config.log_file.display()))?
        .with_retry_policy(config.retry);

    // the one unrecoverable startup error: no log file, no service
    service
        .initialize()
        .with_context(|| format!("failed to create log file {}", config.log_file.display()))?;

    let app = router(Arc::new(service), &config.public_dir);

    let listener = TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    info!("server running on http://{}", listener.local_addr()?);
    info!("serving static files from {}", config.public_dir.display());
    info!("using log file at {}", config.log_file.display());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}
