use std::io;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use worklog_server::{run, Args};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_level.as_deref());

    let config = args.into_config()?;
    if let Err(e) = run(config).await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr);

    let _ = builder.try_init();
}
