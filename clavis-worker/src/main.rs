//! # Clavis Worker
//!
//! Entry point for the background worker. Loads configuration from the
//! environment, connects to Postgres, and runs the job consumer until a
//! shutdown signal arrives.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p clavis-worker
//! ```

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clavis_core::config::Config;
use clavis_core::db::pool::{close_pool, create_pool, PoolSettings};
use clavis_worker::consumer::JobConsumer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clavis_worker=debug,clavis_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Clavis Worker v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    let pool = create_pool(PoolSettings::from(config.database.clone())).await?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            signal_token.cancel();
        }
    });

    let consumer = JobConsumer::new(pool.clone());
    consumer.run(shutdown).await?;

    close_pool(pool).await;
    tracing::info!("Worker stopped");

    Ok(())
}
