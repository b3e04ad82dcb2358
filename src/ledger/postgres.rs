// region:    --- Imports
use crate::auction::model::{Auction, BidRow, BidView};
use crate::bidding::commands::{validate_bid, BidAccepted, PlaceBidCommand};
use crate::error::BidError;
use crate::ledger::{AuctionFilter, BidLedger, BidderProfile};
use crate::query::queries;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::sync::Arc;
use tracing::info;

// endregion: --- Imports

// region:    --- Postgres Ledger

/// Ledger backed by Postgres. The per-auction critical section is the
/// row lock taken by `SELECT ... FOR UPDATE`: two bids on the same
/// auction serialize on that row, bids on different auctions do not
/// contend.
pub struct PostgresLedger {
    pool: Arc<PgPool>,
}

impl PostgresLedger {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BidLedger for PostgresLedger {
    async fn auction(&self, auction_id: i64) -> Result<Auction, BidError> {
        sqlx::query_as::<_, Auction>(queries::GET_AUCTION)
            .bind(auction_id)
            .fetch_optional(&*self.pool)
            .await?
            .ok_or(BidError::AuctionNotFound(auction_id))
    }

    async fn list_auctions(&self, filter: &AuctionFilter) -> Result<Vec<Auction>, BidError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(queries::LIST_AUCTIONS);
        let mut sep = " WHERE ";
        if let Some(status) = filter.status {
            qb.push(sep).push("status = ").push_bind(status);
            sep = " AND ";
        }
        if let Some(seller_id) = filter.seller_id {
            qb.push(sep).push("seller_id = ").push_bind(seller_id);
            sep = " AND ";
        }
        if let Some(product_id) = filter.product_id {
            qb.push(sep).push("product_id = ").push_bind(product_id);
        }
        qb.push(" ORDER BY end_time ASC");

        let auctions = qb
            .build_query_as::<Auction>()
            .fetch_all(&*self.pool)
            .await?;
        Ok(auctions)
    }

    async fn bids(&self, auction_id: i64) -> Result<Vec<BidView>, BidError> {
        let rows = sqlx::query_as::<_, BidRow>(queries::GET_BID_HISTORY)
            .bind(auction_id)
            .fetch_all(&*self.pool)
            .await?;
        Ok(rows.into_iter().map(BidRow::into_view).collect())
    }

    async fn place_bid(
        &self,
        cmd: PlaceBidCommand,
        now: DateTime<Utc>,
    ) -> Result<BidAccepted, BidError> {
        let mut tx = self.pool.begin().await?;

        // Row lock: the increment check below always reads the price the
        // previous accepted bid committed.
        let auction = sqlx::query_as::<_, Auction>(queries::GET_AUCTION_FOR_UPDATE)
            .bind(cmd.auction_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(BidError::AuctionNotFound(cmd.auction_id))?;

        let bidder = sqlx::query_as::<_, BidderProfile>(queries::GET_BIDDER)
            .bind(cmd.bidder_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(BidError::BidderNotFound(cmd.bidder_id))?;

        validate_bid(&auction, cmd.amount, now)?;

        let bid_id = sqlx::query_scalar::<_, i64>(queries::INSERT_BID)
            .bind(cmd.auction_id)
            .bind(cmd.bidder_id)
            .bind(cmd.amount)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        let updated = sqlx::query_as::<_, Auction>(queries::UPDATE_AUCTION_AGGREGATE)
            .bind(cmd.amount)
            .bind(now)
            .bind(cmd.auction_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            "{:<12} --> bid {} accepted on auction {}: price {} -> {}",
            "Ledger", bid_id, cmd.auction_id, auction.current_price, updated.current_price
        );

        let bid = BidRow {
            id: bid_id,
            auction_id: cmd.auction_id,
            bidder_id: cmd.bidder_id,
            amount: cmd.amount,
            created_at: now,
            bidder_name: bidder.full_name,
            bidder_email: bidder.email,
        }
        .into_view();

        Ok(BidAccepted {
            bid,
            auction: updated,
        })
    }
}

// endregion: --- Postgres Ledger
