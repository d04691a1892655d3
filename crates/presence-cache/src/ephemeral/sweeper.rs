//! Server-side staleness sweeper.
//!
//! Finds clients whose liveness key expired and applies their disconnect
//! fallbacks on their behalf. Several sweepers may run at once: a client is
//! claimed atomically (liveness re-checked, removed from the client set and
//! its fallback hash drained in one script) so each fallback fires once.

use redis::AsyncCommands;
use std::future::Future;
use std::time::Duration;

use super::commands::{self, ClaimMode};
use super::keys;
use crate::error::RedisResult;
use crate::pool::SharedRedisPool;

/// Shortest accepted sweep period
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Outcome of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Registered clients inspected
    pub checked: usize,
    /// Clients found dead and claimed by this sweeper
    pub expired: usize,
    /// Fallbacks applied
    pub fired: usize,
}

/// Periodic liveness sweeper
pub struct LivenessSweeper {
    pool: SharedRedisPool,
    interval: Duration,
    claim_script: redis::Script,
}

impl std::fmt::Debug for LivenessSweeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LivenessSweeper")
            .field("interval", &self.interval)
            .finish()
    }
}

impl LivenessSweeper {
    /// Intervals below one millisecond are raised to it
    pub fn new(pool: SharedRedisPool, interval: Duration) -> Self {
        Self {
            pool,
            interval: interval.max(MIN_INTERVAL),
            claim_script: commands::claim_script(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Inspect every registered client once
    pub async fn sweep_once(&self) -> RedisResult<SweepStats> {
        let mut conn = self.pool.get().await?;
        let clients: Vec<String> = conn.smembers(keys::CLIENTS_SET).await?;

        let mut stats = SweepStats {
            checked: clients.len(),
            ..SweepStats::default()
        };

        for client_id in clients {
            let claim = commands::claim_fallbacks(
                &mut conn,
                &self.claim_script,
                &client_id,
                ClaimMode::Expired,
            )
            .await?;
            if !claim.removed && claim.entries.is_empty() {
                continue;
            }

            let fired = commands::apply_fallbacks(&mut conn, &client_id, claim.entries).await?;
            tracing::info!(client_id = %client_id, fired, "Applied fallbacks of expired client");

            if claim.removed {
                stats.expired += 1;
            }
            stats.fired += fired;
        }

        Ok(stats)
    }

    /// Sweep on every tick until `shutdown` resolves
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!(interval_ms = self.interval.as_millis() as u64, "Liveness sweeper started");

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = ticker.tick() => match self.sweep_once().await {
                    Ok(stats) if stats.expired > 0 => tracing::info!(
                        checked = stats.checked,
                        expired = stats.expired,
                        fired = stats.fired,
                        "Sweep completed"
                    ),
                    Ok(stats) => tracing::trace!(checked = stats.checked, "Sweep completed"),
                    Err(e) => tracing::warn!(error = %e, "Sweep failed"),
                },
            }
        }

        tracing::info!("Liveness sweeper stopped");
    }
}
