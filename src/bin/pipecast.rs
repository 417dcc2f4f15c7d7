//! Relay Application
//!
//! Reads encoded audio from a named pipe and streams it to every HTTP client.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pipecast::{Relay, RelayConfig};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = match std::env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => match RelayConfig::default_path() {
            Ok(path) => path,
            Err(e) => {
                eprintln!("Usage: pipecast <configFile>");
                return Err(e.into());
            }
        },
    };

    let config = RelayConfig::load(&config_path)
        .with_context(|| format!("error reading config file {}", config_path.display()))?;

    tracing::info!(
        "Starting relay: {} -> http://{}",
        config.fifo.display(),
        config.listen_addr()?
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(async {
        let relay = Relay::bind(&config).await?;
        relay.run(shutdown_signal()).await
    });

    // Opening a pipe blocks a worker until a writer shows up; don't wait on it
    runtime.shutdown_timeout(Duration::from_secs(1));

    result?;
    tracing::info!("Relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
