mod config;
mod error;

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use broker_memory::MemoryBroker;
use cdc_api::Broker;
use cdc_engine::Bridge;
use cdc_engine::config::{BridgeConfig, BrokerKind};

use config::Cli;
use error::ServerError;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    tracing::info!("goodbye");
}

async fn run(cli: Cli) -> Result<(), ServerError> {
    let config = cli.into_config()?;
    let broker = build_broker(&config);
    let bridge = Arc::new(Bridge::new(config, broker)?);

    let shutdown = CancellationToken::new();
    watch_signals(shutdown.clone())?;

    cdc_api_server::run(bridge, shutdown).await?;
    Ok(())
}

fn build_broker(config: &BridgeConfig) -> Arc<dyn Broker> {
    let broker = match config.broker.kind {
        BrokerKind::Memory => MemoryBroker::new(config.broker.max_records),
        BrokerKind::Dump => MemoryBroker::dump(config.broker.max_records),
    };
    tracing::info!(kind = ?config.broker.kind, max_records = config.broker.max_records, "broker ready");
    Arc::new(broker.with_ack_delay(config.ack_delay()))
}

/// Cancel `shutdown` on SIGINT or SIGTERM.
fn watch_signals(shutdown: CancellationToken) -> Result<(), ServerError> {
    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::spawn(async move {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => tracing::info!("SIGINT received, shutting down"),
                _ = sigterm.recv() => tracing::info!("SIGTERM received, shutting down"),
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("interrupt received, shutting down");
        }
        shutdown.cancel();
    });
    Ok(())
}
