/// Auction status scheduler.
///
/// Keeps the stored status column in step with the clock so list queries
/// and dashboards see `scheduled -> active -> ended` without recomputing.
/// Bidding never depends on this tick: the state machine re-derives the
/// effective status from the timestamps on every attempt, so a lagging
/// scheduler cannot open or extend a bidding window.
// region:    --- Imports
use crate::query::queries;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{debug, error};

// endregion: --- Imports

// region:    --- Auction Scheduler

pub struct AuctionScheduler {
    pool: Arc<PgPool>,
}

impl AuctionScheduler {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Spawn the 1-second tick.
    pub async fn start(&self) {
        let pool = Arc::clone(&self.pool);
        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(1));
            loop {
                interval.tick().await;
                if let Err(e) = Self::update_auction_statuses(&pool).await {
                    error!(
                        "{:<12} --> status update failed: {:?}",
                        "Scheduler", e
                    );
                }
            }
        });
    }

    async fn update_auction_statuses(pool: &PgPool) -> Result<(), sqlx::Error> {
        let now = Utc::now();

        sqlx::query(queries::ACTIVATE_DUE_AUCTIONS)
            .bind(now)
            .execute(pool)
            .await?;

        sqlx::query(queries::END_DUE_AUCTIONS)
            .bind(now)
            .execute(pool)
            .await?;

        debug!("{:<12} --> auction statuses refreshed", "Scheduler");

        Ok(())
    }
}

// endregion: --- Auction Scheduler
