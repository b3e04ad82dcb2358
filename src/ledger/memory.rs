// region:    --- Imports
use crate::auction::model::{sort_history, Auction, AuctionStatus, BidRow, BidView};
use crate::bidding::commands::{validate_bid, BidAccepted, PlaceBidCommand};
use crate::error::BidError;
use crate::ledger::{AuctionFilter, BidLedger, BidderProfile};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

// endregion: --- Imports

// region:    --- Memory Ledger

struct AuctionSlot {
    auction: Auction,
    bids: Vec<BidRow>,
}

/// In-memory ledger with the same semantics as the Postgres one. The
/// per-auction critical section is a `tokio::sync::Mutex` guarding each
/// auction's slot, the single-writer-per-auction-id discipline in process
/// form. Used by the test suite and by `BIDDING_STORE=memory` dev runs.
#[derive(Default)]
pub struct MemoryLedger {
    auctions: DashMap<i64, Arc<Mutex<AuctionSlot>>>,
    bidders: DashMap<i64, BidderProfile>,
    next_auction_id: AtomicI64,
    next_bid_id: AtomicI64,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            auctions: DashMap::new(),
            bidders: DashMap::new(),
            next_auction_id: AtomicI64::new(1),
            next_bid_id: AtomicI64::new(1),
        }
    }

    pub fn register_bidder(&self, id: i64, full_name: Option<&str>, email: Option<&str>) {
        self.bidders.insert(
            id,
            BidderProfile {
                id,
                full_name: full_name.map(str::to_owned),
                email: email.map(str::to_owned),
            },
        );
    }

    /// Create an auction slot. Status starts as `scheduled`; the effective
    /// status is derived from the time window on every access.
    #[allow(clippy::too_many_arguments)]
    pub fn create_auction(
        &self,
        product_id: i64,
        seller_id: i64,
        starting_price: i64,
        minimum_increment: i64,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Auction {
        let now = Utc::now();
        let id = self.next_auction_id.fetch_add(1, Ordering::SeqCst);
        let auction = Auction {
            id,
            product_id,
            seller_id,
            starting_price,
            current_price: starting_price,
            minimum_increment,
            start_time,
            end_time,
            status: AuctionStatus::Scheduled,
            total_bids: 0,
            created_at: now,
            updated_at: now,
        };
        self.auctions.insert(
            id,
            Arc::new(Mutex::new(AuctionSlot {
                auction: auction.clone(),
                bids: Vec::new(),
            })),
        );
        auction
    }

    /// Admin override, e.g. cancelling or flagging an auction for review.
    pub async fn set_status(&self, auction_id: i64, status: AuctionStatus) -> Result<(), BidError> {
        let slot = self.slot(auction_id)?;
        let mut slot = slot.lock().await;
        slot.auction.status = status;
        slot.auction.updated_at = Utc::now();
        Ok(())
    }

    fn slot(&self, auction_id: i64) -> Result<Arc<Mutex<AuctionSlot>>, BidError> {
        self.auctions
            .get(&auction_id)
            .map(|s| Arc::clone(s.value()))
            .ok_or(BidError::AuctionNotFound(auction_id))
    }
}

/// Snapshot with the status the state machine would report at `now`.
/// There is no scheduler tick in memory mode, so read paths derive it.
fn snapshot_at(auction: &Auction, now: DateTime<Utc>) -> Auction {
    let mut auction = auction.clone();
    auction.status = auction.effective_status(now);
    auction
}

#[async_trait]
impl BidLedger for MemoryLedger {
    async fn auction(&self, auction_id: i64) -> Result<Auction, BidError> {
        let slot = self.slot(auction_id)?;
        let slot = slot.lock().await;
        Ok(snapshot_at(&slot.auction, Utc::now()))
    }

    async fn list_auctions(&self, filter: &AuctionFilter) -> Result<Vec<Auction>, BidError> {
        let now = Utc::now();
        let mut auctions = Vec::new();
        for entry in self.auctions.iter() {
            let slot = entry.value().lock().await;
            let auction = snapshot_at(&slot.auction, now);
            if let Some(status) = filter.status {
                if auction.status != status {
                    continue;
                }
            }
            if let Some(seller_id) = filter.seller_id {
                if auction.seller_id != seller_id {
                    continue;
                }
            }
            if let Some(product_id) = filter.product_id {
                if auction.product_id != product_id {
                    continue;
                }
            }
            auctions.push(auction);
        }
        auctions.sort_by(|a, b| a.end_time.cmp(&b.end_time).then(a.id.cmp(&b.id)));
        Ok(auctions)
    }

    async fn bids(&self, auction_id: i64) -> Result<Vec<BidView>, BidError> {
        let slot = self.slot(auction_id)?;
        let slot = slot.lock().await;
        let mut views: Vec<BidView> = slot.bids.iter().cloned().map(BidRow::into_view).collect();
        sort_history(&mut views);
        Ok(views)
    }

    async fn place_bid(
        &self,
        cmd: PlaceBidCommand,
        now: DateTime<Utc>,
    ) -> Result<BidAccepted, BidError> {
        let slot = self.slot(cmd.auction_id)?;
        let bidder = self
            .bidders
            .get(&cmd.bidder_id)
            .map(|b| b.value().clone())
            .ok_or(BidError::BidderNotFound(cmd.bidder_id))?;

        // Critical section: validation and append are atomic per auction,
        // and bid id assignment order equals acceptance order.
        let mut slot = slot.lock().await;
        validate_bid(&slot.auction, cmd.amount, now)?;

        let bid_id = self.next_bid_id.fetch_add(1, Ordering::SeqCst);
        let row = BidRow {
            id: bid_id,
            auction_id: cmd.auction_id,
            bidder_id: cmd.bidder_id,
            amount: cmd.amount,
            created_at: now,
            bidder_name: bidder.full_name,
            bidder_email: bidder.email,
        };
        slot.bids.push(row.clone());
        slot.auction.current_price = cmd.amount;
        slot.auction.total_bids += 1;
        slot.auction.updated_at = now;

        info!(
            "{:<12} --> bid {} accepted on auction {}: price now {}",
            "Ledger", bid_id, cmd.auction_id, cmd.amount
        );

        Ok(BidAccepted {
            bid: row.into_view(),
            auction: snapshot_at(&slot.auction, now),
        })
    }
}

// endregion: --- Memory Ledger

// region:    --- Tests

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ledger_with_active_auction(starting_price: i64, increment: i64) -> (MemoryLedger, Auction) {
        let ledger = MemoryLedger::new();
        ledger.register_bidder(1, Some("Fatima"), Some("fatima@example.com"));
        ledger.register_bidder(2, None, Some("khalid@example.com"));
        let now = Utc::now();
        let auction = ledger.create_auction(
            10,
            20,
            starting_price,
            increment,
            now - Duration::minutes(5),
            now + Duration::minutes(5),
        );
        (ledger, auction)
    }

    fn cmd(auction_id: i64, bidder_id: i64, amount: i64) -> PlaceBidCommand {
        PlaceBidCommand {
            auction_id,
            bidder_id,
            amount,
        }
    }

    #[tokio::test]
    async fn rejects_then_accepts_around_the_minimum() {
        let (ledger, auction) = ledger_with_active_auction(100, 5);

        let err = ledger
            .place_bid(cmd(auction.id, 1, 104), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, BidError::BidTooLow { minimum: 105 }));

        // Rejection mutated nothing.
        let snapshot = ledger.auction(auction.id).await.unwrap();
        assert_eq!(snapshot.current_price, 100);
        assert_eq!(snapshot.total_bids, 0);

        let accepted = ledger
            .place_bid(cmd(auction.id, 1, 105), Utc::now())
            .await
            .unwrap();
        assert_eq!(accepted.auction.current_price, 105);
        assert_eq!(accepted.auction.total_bids, 1);
        assert_eq!(accepted.bid.amount, 105);
    }

    #[tokio::test]
    async fn current_price_tracks_max_accepted_and_is_monotone() {
        let (ledger, auction) = ledger_with_active_auction(100, 5);

        let mut max_accepted = auction.starting_price;
        let mut last_price = auction.starting_price;
        for amount in [105, 111, 116, 130, 135, 200] {
            let accepted = ledger
                .place_bid(cmd(auction.id, 1, amount), Utc::now())
                .await
                .unwrap();
            max_accepted = max_accepted.max(amount);
            assert_eq!(accepted.auction.current_price, max_accepted);
            assert!(accepted.auction.current_price >= last_price);
            last_price = accepted.auction.current_price;
        }

        let snapshot = ledger.auction(auction.id).await.unwrap();
        assert_eq!(snapshot.total_bids, 6);
        assert_eq!(snapshot.current_price, 200);
    }

    #[tokio::test]
    async fn cancelled_auction_refuses_any_amount() {
        let (ledger, auction) = ledger_with_active_auction(100, 5);
        ledger
            .set_status(auction.id, AuctionStatus::Cancelled)
            .await
            .unwrap();

        let err = ledger
            .place_bid(cmd(auction.id, 1, 1_000_000), Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "AUCTION_NOT_ACTIVE");
    }

    #[tokio::test]
    async fn unknown_auction_and_bidder_are_reported() {
        let (ledger, auction) = ledger_with_active_auction(100, 5);

        let err = ledger.place_bid(cmd(999, 1, 105), Utc::now()).await.unwrap_err();
        assert!(matches!(err, BidError::AuctionNotFound(999)));

        let err = ledger
            .place_bid(cmd(auction.id, 999, 105), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, BidError::BidderNotFound(999)));
    }

    #[tokio::test]
    async fn history_masks_bidders_and_orders_recent_first() {
        let (ledger, auction) = ledger_with_active_auction(100, 5);
        let t0 = Utc::now();
        ledger
            .place_bid(cmd(auction.id, 1, 105), t0)
            .await
            .unwrap();
        ledger
            .place_bid(cmd(auction.id, 2, 110), t0 + Duration::seconds(1))
            .await
            .unwrap();

        let bids = ledger.bids(auction.id).await.unwrap();
        assert_eq!(bids.len(), 2);
        assert_eq!(bids[0].amount, 110);
        assert_eq!(bids[1].amount, 105);
        assert_eq!(bids[1].bidder_display, "F***a");
        assert_eq!(bids[0].bidder_display, "k***d");
        assert!(!bids.iter().any(|b| b.bidder_display.contains("Fatima")));
        assert!(!bids
            .iter()
            .any(|b| b.bidder_display.contains("example.com")));
    }

    #[tokio::test]
    async fn snapshots_report_the_clock_derived_status() {
        let (ledger, auction) = ledger_with_active_auction(100, 5);

        // Stored status is still `scheduled`; reads derive from the window.
        let snapshot = ledger.auction(auction.id).await.unwrap();
        assert_eq!(snapshot.status, AuctionStatus::Active);

        let accepted = ledger
            .place_bid(cmd(auction.id, 1, 105), Utc::now())
            .await
            .unwrap();
        assert_eq!(accepted.auction.status, AuctionStatus::Active);

        let filter = AuctionFilter {
            status: Some(AuctionStatus::Active),
            ..Default::default()
        };
        let active = ledger.list_auctions(&filter).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, auction.id);

        // A past-window auction reports ended without any scheduler tick.
        let now = Utc::now();
        let past = ledger.create_auction(
            11,
            20,
            100,
            5,
            now - Duration::minutes(10),
            now - Duration::minutes(5),
        );
        let snapshot = ledger.auction(past.id).await.unwrap();
        assert_eq!(snapshot.status, AuctionStatus::Ended);

        // Terminal overrides still beat the window.
        ledger
            .set_status(auction.id, AuctionStatus::Cancelled)
            .await
            .unwrap();
        let snapshot = ledger.auction(auction.id).await.unwrap();
        assert_eq!(snapshot.status, AuctionStatus::Cancelled);
    }

    #[tokio::test]
    async fn highest_bid_returns_the_leader() {
        let (ledger, auction) = ledger_with_active_auction(100, 5);
        let t0 = Utc::now();
        ledger.place_bid(cmd(auction.id, 1, 105), t0).await.unwrap();
        ledger
            .place_bid(cmd(auction.id, 2, 120), t0 + Duration::seconds(1))
            .await
            .unwrap();

        let top = ledger.highest_bid(auction.id).await.unwrap().unwrap();
        assert_eq!(top.amount, 120);
        assert_eq!(top.bidder_id, 2);
    }
}

// endregion: --- Tests
