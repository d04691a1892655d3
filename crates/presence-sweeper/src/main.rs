//! Presence sweeper entry point
//!
//! Run with:
//! ```bash
//! cargo run -p presence-sweeper
//! ```
//!
//! Applies the disconnect fallbacks of clients whose liveness key expired.
//! Configuration is loaded from environment variables (`.env` supported).

use std::sync::Arc;

use presence_cache::{LivenessSweeper, RedisPool};
use presence_common::{try_init_tracing_with_config, AppConfig, AppError, TracingConfig};
use presence_db::{create_pool, DatabaseConfig, PgProfileStore};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = try_init_tracing_with_config(TracingConfig::from_env()) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run().await {
        error!(error = %e, code = e.error_code(), "Sweeper failed");
        std::process::exit(e.exit_code());
    }
}

async fn run() -> Result<(), AppError> {
    info!("Starting presence sweeper...");

    let config = AppConfig::from_env()?;
    info!(
        env = ?config.app.env,
        sweep_interval_secs = config.presence.sweep_interval_secs,
        liveness_ttl_secs = config.presence.liveness_ttl_secs,
        "Configuration loaded"
    );

    if let Some(database) = &config.database {
        info!("Connecting to PostgreSQL...");
        let pool = create_pool(&DatabaseConfig::from(database))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        PgProfileStore::new(pool).ensure_schema().await?;
        info!("Profile schema ready");
    }

    info!("Connecting to Redis...");
    let redis = RedisPool::from_config(&config.redis).map_err(|e| AppError::Cache(e.to_string()))?;
    redis
        .health_check()
        .await
        .map_err(|e| AppError::Cache(e.to_string()))?;
    info!("Redis connection established");

    let sweeper = LivenessSweeper::new(Arc::new(redis), config.presence.sweep_interval());
    sweeper.run(shutdown_signal()).await;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            error!(error = %e, "Failed to listen for shutdown signal; running until killed");
            std::future::pending::<()>().await;
        }
    }
}
