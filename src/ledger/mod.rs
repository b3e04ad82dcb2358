/// The bid ledger: durable, ordered storage of all bids plus the auction
/// aggregate it feeds. `place_bid` is the only write path and runs inside
/// a per-auction critical section in every implementation.
// region:    --- Imports
use crate::auction::model::{Auction, AuctionStatus, BidView};
use crate::bidding::commands::{BidAccepted, PlaceBidCommand};
use crate::error::BidError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

mod memory;
mod postgres;

pub use memory::MemoryLedger;
pub use postgres::PostgresLedger;

// endregion: --- Imports

// region:    --- Filter

/// Optional list filters, matching the catalog browse query params.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct AuctionFilter {
    pub status: Option<AuctionStatus>,
    pub seller_id: Option<i64>,
    pub product_id: Option<i64>,
}

// endregion: --- Filter

// region:    --- Bidder Profile

/// Raw bidder identity as stored. Only ever leaves the ledger after
/// masking (see `auction::display`).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BidderProfile {
    pub id: i64,
    pub full_name: Option<String>,
    pub email: Option<String>,
}

// endregion: --- Bidder Profile

// region:    --- Ledger Trait

#[async_trait]
pub trait BidLedger: Send + Sync {
    /// Auction snapshot by id.
    async fn auction(&self, auction_id: i64) -> Result<Auction, BidError>;

    /// Auctions matching the filter, soonest to end first.
    async fn list_auctions(&self, filter: &AuctionFilter) -> Result<Vec<Auction>, BidError>;

    /// Full bid history for an auction, most recent first, bidder
    /// identity already masked.
    async fn bids(&self, auction_id: i64) -> Result<Vec<BidView>, BidError>;

    /// Validate and append a bid atomically; returns the created bid and
    /// the updated auction snapshot.
    async fn place_bid(
        &self,
        cmd: PlaceBidCommand,
        now: DateTime<Utc>,
    ) -> Result<BidAccepted, BidError>;

    /// Current leader: greatest amount, earliest timestamp on ties.
    async fn highest_bid(&self, auction_id: i64) -> Result<Option<BidView>, BidError> {
        let bids = self.bids(auction_id).await?;
        Ok(crate::auction::model::leader(&bids).cloned())
    }
}

// endregion: --- Ledger Trait
