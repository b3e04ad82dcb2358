/// Bid acceptance rules.
///
/// Every ledger implementation runs [`validate_bid`] inside its per-auction
/// critical section, so the increment check always reads the price the
/// previous accepted bid left behind, never a client-supplied stale one.
// region:    --- Imports
use crate::auction::model::{Auction, AuctionStatus, BidView};
use crate::error::{BidError, NotActiveReason};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// endregion: --- Imports

// region:    --- Commands

/// Bid submission.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlaceBidCommand {
    pub auction_id: i64,
    pub bidder_id: i64,
    pub amount: i64,
}

/// Result of an accepted bid: the created bid plus the post-mutation
/// auction snapshot, self-sufficient for broadcasting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidAccepted {
    pub bid: BidView,
    pub auction: Auction,
}

// endregion: --- Commands

// region:    --- Validation

/// Gate a bid attempt against the auction state at `now`.
///
/// Rejections carry no side effects; callers only mutate the ledger after
/// this returns `Ok`.
pub fn validate_bid(auction: &Auction, amount: i64, now: DateTime<Utc>) -> Result<(), BidError> {
    if amount <= 0 {
        return Err(BidError::InvalidAmount);
    }

    match auction.effective_status(now) {
        AuctionStatus::Active => {}
        AuctionStatus::Scheduled => {
            return Err(BidError::AuctionNotActive {
                reason: NotActiveReason::NotStarted,
            })
        }
        AuctionStatus::Ended => {
            return Err(BidError::AuctionNotActive {
                reason: NotActiveReason::Ended,
            })
        }
        AuctionStatus::Cancelled => {
            return Err(BidError::AuctionNotActive {
                reason: NotActiveReason::Cancelled,
            })
        }
        AuctionStatus::PendingReview => {
            return Err(BidError::AuctionNotActive {
                reason: NotActiveReason::UnderReview,
            })
        }
    }

    let minimum = auction.min_accepted_bid();
    if amount < minimum {
        return Err(BidError::BidTooLow { minimum });
    }

    Ok(())
}

// endregion: --- Validation

// region:    --- Tests

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn active_auction(current_price: i64, increment: i64) -> Auction {
        let now = Utc::now();
        Auction {
            id: 1,
            product_id: 10,
            seller_id: 20,
            starting_price: 100,
            current_price,
            minimum_increment: increment,
            start_time: now - Duration::minutes(5),
            end_time: now + Duration::minutes(5),
            status: AuctionStatus::Active,
            total_bids: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn accepts_amount_meeting_the_increment() {
        let auction = active_auction(100, 5);
        assert!(validate_bid(&auction, 105, Utc::now()).is_ok());
        assert!(validate_bid(&auction, 200, Utc::now()).is_ok());
    }

    #[test]
    fn rejects_amount_below_the_increment() {
        let auction = active_auction(100, 5);
        match validate_bid(&auction, 104, Utc::now()) {
            Err(BidError::BidTooLow { minimum }) => assert_eq!(minimum, 105),
            other => panic!("expected BidTooLow, got {other:?}"),
        }
    }

    #[test]
    fn rejects_non_positive_amounts() {
        let auction = active_auction(100, 5);
        assert!(matches!(
            validate_bid(&auction, 0, Utc::now()),
            Err(BidError::InvalidAmount)
        ));
        assert!(matches!(
            validate_bid(&auction, -10, Utc::now()),
            Err(BidError::InvalidAmount)
        ));
    }

    #[test]
    fn rejects_before_start_regardless_of_amount() {
        let mut auction = active_auction(100, 5);
        auction.start_time = Utc::now() + Duration::minutes(1);
        match validate_bid(&auction, 1_000_000, Utc::now()) {
            Err(BidError::AuctionNotActive { reason }) => {
                assert_eq!(reason, NotActiveReason::NotStarted)
            }
            other => panic!("expected AuctionNotActive, got {other:?}"),
        }
    }

    #[test]
    fn rejects_after_end_regardless_of_amount() {
        let mut auction = active_auction(100, 5);
        auction.end_time = Utc::now() - Duration::seconds(1);
        match validate_bid(&auction, 1_000_000, Utc::now()) {
            Err(BidError::AuctionNotActive { reason }) => {
                assert_eq!(reason, NotActiveReason::Ended)
            }
            other => panic!("expected AuctionNotActive, got {other:?}"),
        }
    }

    #[test]
    fn rejects_admin_suspended_auctions() {
        let mut auction = active_auction(100, 5);
        auction.status = AuctionStatus::Cancelled;
        assert!(matches!(
            validate_bid(&auction, 200, Utc::now()),
            Err(BidError::AuctionNotActive {
                reason: NotActiveReason::Cancelled
            })
        ));

        auction.status = AuctionStatus::PendingReview;
        assert!(matches!(
            validate_bid(&auction, 200, Utc::now()),
            Err(BidError::AuctionNotActive {
                reason: NotActiveReason::UnderReview
            })
        ));
    }
}

// endregion: --- Tests
