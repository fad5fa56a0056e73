//! Ledger server binary

use anyhow::Result;
use aqua_ledger::{Config, Ledger};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting Aqua Ledger Server");

    // Configuration from environment, falling back to defaults
    let config = Config::from_env()?;

    let ledger = Ledger::open(config)?;
    tracing::info!("Ledger opened successfully");

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down ledger server");
    ledger.shutdown().await?;
    Ok(())
}
