//! Economy engine server binary

use economy::{Economy, EconomyConfig};
use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting StarMine Economy Server");

    // Load configuration
    let config = match std::env::args().nth(1) {
        Some(path) => EconomyConfig::from_file(path)?,
        None => EconomyConfig::from_env()?,
    };

    // Open the economy and backfill accrual missed while down
    let economy = Economy::open(config).await?;
    let scheduler = economy.spawn_scheduler().await?;
    tracing::info!("Economy opened, accrual scheduler running");

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down economy server");
    scheduler.abort();
    economy.shutdown().await?;
    Ok(())
}
