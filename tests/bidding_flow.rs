use auction_bidding_service::bidding::commands::PlaceBidCommand;
use auction_bidding_service::client::{AuctionView, LeaderLabel, LiveStatus};
use auction_bidding_service::error::BidError;
use auction_bidding_service::ledger::{BidLedger, MemoryLedger};
use auction_bidding_service::realtime::{AuctionBroadcaster, AuctionUpdate, ServerFrame};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;

fn cmd(auction_id: i64, bidder_id: i64, amount: i64) -> PlaceBidCommand {
    PlaceBidCommand {
        auction_id,
        bidder_id,
        amount,
    }
}

fn seeded_ledger(starting_price: i64, increment: i64) -> (Arc<MemoryLedger>, i64) {
    let ledger = MemoryLedger::new();
    for bidder_id in 1..=60 {
        ledger.register_bidder(bidder_id, Some("Test Bidder"), None);
    }
    let now = Utc::now();
    let auction = ledger.create_auction(
        10,
        20,
        starting_price,
        increment,
        now - Duration::minutes(1),
        now + Duration::minutes(10),
    );
    (Arc::new(ledger), auction.id)
}

fn update_from(accepted: &auction_bidding_service::bidding::commands::BidAccepted) -> AuctionUpdate {
    AuctionUpdate {
        auction_id: accepted.auction.id,
        bid: accepted.bid.clone(),
        current_price: accepted.auction.current_price,
        total_bids: accepted.auction.total_bids,
        placed_at: accepted.bid.created_at,
    }
}

/// Two bids in increment order both land; the aggregate sees no lost update.
#[tokio::test]
async fn sequential_bids_accumulate_without_lost_updates() {
    let (ledger, auction_id) = seeded_ledger(90, 5);

    ledger.place_bid(cmd(auction_id, 1, 100), Utc::now()).await.unwrap();
    ledger.place_bid(cmd(auction_id, 2, 105), Utc::now()).await.unwrap();

    let auction = ledger.auction(auction_id).await.unwrap();
    assert_eq!(auction.current_price, 105);
    assert_eq!(auction.total_bids, 2);
}

/// Concurrent bids on one auction serialize: whatever order the race
/// resolves in, the final price is the maximum accepted amount and the
/// bid count matches the ledger exactly.
#[tokio::test]
async fn racing_bids_serialize_on_the_auction() {
    let (ledger, auction_id) = seeded_ledger(90, 5);

    let l1 = Arc::clone(&ledger);
    let l2 = Arc::clone(&ledger);
    let b1 = tokio::spawn(async move { l1.place_bid(cmd(auction_id, 1, 100), Utc::now()).await });
    let b2 = tokio::spawn(async move { l2.place_bid(cmd(auction_id, 2, 105), Utc::now()).await });

    let r1 = b1.await.unwrap();
    let r2 = b2.await.unwrap();

    // 105 always clears the bar (90+5 or 100+5); 100 only if it ran first.
    assert!(r2.is_ok());
    let accepted = 1 + usize::from(r1.is_ok());

    let auction = ledger.auction(auction_id).await.unwrap();
    assert_eq!(auction.current_price, 105);
    assert_eq!(auction.total_bids as usize, accepted);

    let bids = ledger.bids(auction_id).await.unwrap();
    assert_eq!(bids.len(), accepted);
}

/// A storm of concurrent bidders: acceptance order is total, prices are
/// strictly increasing along ledger order, and nothing is lost.
#[tokio::test]
async fn concurrent_bidding_storm_preserves_monotonicity() {
    let (ledger, auction_id) = seeded_ledger(10_000, 1_000);

    let mut handles = Vec::new();
    for i in 1..=50i64 {
        let ledger = Arc::clone(&ledger);
        let amount = 10_000 + i * 1_000;
        handles.push(tokio::spawn(async move {
            ledger.place_bid(cmd(auction_id, i, amount), Utc::now()).await
        }));
    }

    let mut accepted_amounts = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(accepted) => accepted_amounts.push(accepted.bid.amount),
            Err(BidError::BidTooLow { .. }) => {}
            Err(other) => panic!("unexpected rejection: {other:?}"),
        }
    }
    assert!(!accepted_amounts.is_empty());

    let auction = ledger.auction(auction_id).await.unwrap();
    let max_accepted = accepted_amounts.iter().copied().max().unwrap();
    assert_eq!(auction.current_price, max_accepted);
    assert_eq!(auction.total_bids as usize, accepted_amounts.len());

    // Ledger order (ascending id) must carry strictly increasing amounts:
    // every acceptance read the price its predecessor committed.
    let mut bids = ledger.bids(auction_id).await.unwrap();
    bids.sort_by_key(|b| b.id);
    for pair in bids.windows(2) {
        assert!(
            pair[1].amount >= pair[0].amount + 1_000,
            "increment violated between bids {} and {}",
            pair[0].id,
            pair[1].id
        );
    }
}

/// Full fan-out loop: accepted bids broadcast to a room reach every
/// subscribed view, and views converge regardless of delivery order or
/// duplication.
#[tokio::test]
async fn subscribed_views_converge_on_the_same_state() {
    let (ledger, auction_id) = seeded_ledger(100, 5);
    let broadcaster = AuctionBroadcaster::new();

    let (tx_a, mut rx_a) = mpsc::unbounded_channel();
    let (tx_b, mut rx_b) = mpsc::unbounded_channel();
    broadcaster.join(auction_id, 1, tx_a);
    broadcaster.join(auction_id, 2, tx_b);

    let snapshot = ledger.auction(auction_id).await.unwrap();
    let mut view_a = AuctionView::new(snapshot.clone(), vec![]);
    let mut view_b = AuctionView::new(snapshot, vec![]);
    view_a.set_live_status(LiveStatus::Connected);
    view_b.set_live_status(LiveStatus::Connected);

    for (bidder, amount) in [(1, 105), (2, 110), (1, 120)] {
        let accepted = ledger
            .place_bid(cmd(auction_id, bidder, amount), Utc::now())
            .await
            .unwrap();
        broadcaster.broadcast(update_from(&accepted));
    }

    let mut updates_a = Vec::new();
    while let Ok(frame) = rx_a.try_recv() {
        if let ServerFrame::Update(update) = frame {
            updates_a.push(update);
        }
    }
    let mut updates_b = Vec::new();
    while let Ok(frame) = rx_b.try_recv() {
        if let ServerFrame::Update(update) = frame {
            updates_b.push(update);
        }
    }
    assert_eq!(updates_a.len(), 3);
    assert_eq!(updates_b.len(), 3);

    // View A gets them in order; view B reversed and with a duplicate.
    for update in &updates_a {
        view_a.apply_update(update);
    }
    for update in updates_b.iter().rev() {
        view_b.apply_update(update);
    }
    view_b.apply_update(&updates_b[0]);

    assert_eq!(view_a.auction.current_price, 120);
    assert_eq!(view_b.auction.current_price, 120);
    assert_eq!(view_a.auction.total_bids, 3);
    assert_eq!(view_b.auction.total_bids, 3);

    let ids_a: Vec<i64> = view_a.bids.iter().map(|b| b.id).collect();
    let ids_b: Vec<i64> = view_b.bids.iter().map(|b| b.id).collect();
    assert_eq!(ids_a, ids_b);

    // Same leader everywhere, flipping to winner once the clock passes end.
    let leader = view_a.leader().unwrap();
    assert_eq!(leader.amount, 120);
    assert_eq!(leader.bidder_id, 1);
    assert_eq!(
        view_a.leader_label(Utc::now()),
        Some(LeaderLabel::LeadingBidder)
    );
    assert_eq!(
        view_b.leader_label(view_b.auction.end_time + Duration::seconds(1)),
        Some(LeaderLabel::Winner)
    );
}

/// The submitter falls back to a re-fetch when its channel is down.
#[tokio::test]
async fn offline_submitter_reconciles_via_refetch() {
    let (ledger, auction_id) = seeded_ledger(100, 5);

    let snapshot = ledger.auction(auction_id).await.unwrap();
    let mut view = AuctionView::new(snapshot, vec![]);
    view.set_live_status(LiveStatus::Disconnected);

    ledger
        .place_bid(cmd(auction_id, 1, 105), Utc::now())
        .await
        .unwrap();

    // No broadcast arrives; the view is stale and knows it.
    assert_eq!(view.auction.current_price, 100);
    assert!(view.needs_refetch_after_submit());

    let auction = ledger.auction(auction_id).await.unwrap();
    let bids = ledger.bids(auction_id).await.unwrap();
    view.replace(auction, bids);

    assert_eq!(view.auction.current_price, 105);
    assert_eq!(view.bids.len(), 1);
}
