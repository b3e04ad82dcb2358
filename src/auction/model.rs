// region:    --- Imports
use crate::auction::display::mask_bidder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// endregion: --- Imports

// region:    --- Auction Status

/// Stored auction status. Time-derived transitions never look at this alone;
/// see [`Auction::effective_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
pub enum AuctionStatus {
    Scheduled,
    Active,
    Ended,
    Cancelled,
    PendingReview,
}

impl AuctionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionStatus::Scheduled => "scheduled",
            AuctionStatus::Active => "active",
            AuctionStatus::Ended => "ended",
            AuctionStatus::Cancelled => "cancelled",
            AuctionStatus::PendingReview => "pending_review",
        }
    }
}

impl std::fmt::Display for AuctionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// endregion: --- Auction Status

// region:    --- Auction

/// Auction aggregate. Prices are integer minor units.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Auction {
    pub id: i64,
    pub product_id: i64,
    pub seller_id: i64,
    pub starting_price: i64,
    pub current_price: i64,
    pub minimum_increment: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AuctionStatus,
    pub total_bids: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Auction {
    /// Canonical status at `now`. Admin terminal states and an explicit
    /// completion override the time window; otherwise the status is a pure
    /// function of `start_time`/`end_time`.
    pub fn effective_status(&self, now: DateTime<Utc>) -> AuctionStatus {
        match self.status {
            AuctionStatus::Cancelled => AuctionStatus::Cancelled,
            AuctionStatus::PendingReview => AuctionStatus::PendingReview,
            AuctionStatus::Ended => AuctionStatus::Ended,
            AuctionStatus::Scheduled | AuctionStatus::Active => {
                if now < self.start_time {
                    AuctionStatus::Scheduled
                } else if now < self.end_time {
                    AuctionStatus::Active
                } else {
                    AuctionStatus::Ended
                }
            }
        }
    }

    /// Smallest amount the next bid must reach.
    pub fn min_accepted_bid(&self) -> i64 {
        self.current_price + self.minimum_increment
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.effective_status(now) == AuctionStatus::Ended
    }
}

// endregion: --- Auction

// region:    --- Bids

/// Bid as read from storage, including the raw bidder identity used to
/// derive the masked display label. Never serialized onto the wire.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BidRow {
    pub id: i64,
    pub auction_id: i64,
    pub bidder_id: i64,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
    pub bidder_name: Option<String>,
    pub bidder_email: Option<String>,
}

impl BidRow {
    /// Wire form with the bidder identity obfuscated.
    pub fn into_view(self) -> BidView {
        let bidder_display = mask_bidder(
            self.bidder_name.as_deref(),
            self.bidder_email.as_deref(),
            self.bidder_id,
        );
        BidView {
            id: self.id,
            auction_id: self.auction_id,
            bidder_id: self.bidder_id,
            amount: self.amount,
            created_at: self.created_at,
            bidder_display,
        }
    }
}

/// Bid as exposed to clients: only the masked display label, never the
/// raw name or email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidView {
    pub id: i64,
    pub auction_id: i64,
    pub bidder_id: i64,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
    pub bidder_display: String,
}

/// Leader of a set of bids: greatest amount, ties broken by earliest
/// creation time, then by lowest id (first to reach an amount wins).
pub fn leader(bids: &[BidView]) -> Option<&BidView> {
    bids.iter().min_by(|a, b| {
        b.amount
            .cmp(&a.amount)
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    })
}

/// Sort for history display: most recent first, id as tiebreak so the
/// order is total even when timestamps collide.
pub fn sort_history(bids: &mut [BidView]) {
    bids.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

// endregion: --- Bids

// region:    --- Tests


// endregion: --- Tests
