// region:    --- Imports
use crate::auction::model::{leader, sort_history, Auction, BidView};
use crate::client::connection::LiveStatus;
use crate::realtime::AuctionUpdate;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

// endregion: --- Imports

// region:    --- Labels

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderLabel {
    /// Auction has ended; the leader won.
    Winner,
    /// Auction still running; the leader may yet be outbid.
    LeadingBidder,
}

/// Presentational per-bidder aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub bidder_id: i64,
    pub display_name: String,
    pub highest_amount: i64,
    pub bid_count: usize,
}

// endregion: --- Labels

// region:    --- Auction View

/// Local view of one auction under interleaved fetch results and realtime
/// events. Incoming events are treated as a set to merge, never a stream
/// to append blindly: the merge dedupes by bid id and re-sorts, so
/// duplicate or out-of-order delivery cannot corrupt the view.
#[derive(Debug, Clone)]
pub struct AuctionView {
    pub auction: Auction,
    pub bids: Vec<BidView>,
    pub live_status: LiveStatus,
}

impl AuctionView {
    pub fn new(auction: Auction, mut bids: Vec<BidView>) -> Self {
        sort_history(&mut bids);
        Self {
            auction,
            bids,
            live_status: LiveStatus::Connecting,
        }
    }

    pub fn set_live_status(&mut self, status: LiveStatus) {
        self.live_status = status;
    }

    /// Reconciliation after a fallback re-fetch: the server response
    /// replaces the local state wholesale.
    pub fn replace(&mut self, auction: Auction, mut bids: Vec<BidView>) {
        sort_history(&mut bids);
        self.auction = auction;
        self.bids = bids;
    }

    /// Merge one `auction:update` event. Returns false (and does nothing)
    /// for events addressed to a different auction.
    pub fn apply_update(&mut self, update: &AuctionUpdate) -> bool {
        if update.auction_id != self.auction.id {
            return false;
        }

        // Idempotent upsert: drop any copy of this bid, prepend, re-sort.
        self.bids.retain(|b| b.id != update.bid.id);
        self.bids.insert(0, update.bid.clone());
        sort_history(&mut self.bids);

        // Aggregates only ever move forward; a late event cannot regress
        // a fresher price.
        self.auction.current_price = self.auction.current_price.max(update.current_price);
        self.auction.total_bids = self.auction.total_bids.max(update.total_bids);
        true
    }

    /// Highest amount, ties to the earliest bid.
    pub fn leader(&self) -> Option<&BidView> {
        leader(&self.bids)
    }

    pub fn leader_label(&self, now: DateTime<Utc>) -> Option<LeaderLabel> {
        self.leader().map(|_| {
            if self.auction.has_ended(now) {
                LeaderLabel::Winner
            } else {
                LeaderLabel::LeadingBidder
            }
        })
    }

    /// Bidders grouped with their best offer, strongest first.
    pub fn participants(&self) -> Vec<Participant> {
        let mut by_bidder: HashMap<i64, Participant> = HashMap::new();
        for bid in &self.bids {
            let entry = by_bidder
                .entry(bid.bidder_id)
                .or_insert_with(|| Participant {
                    bidder_id: bid.bidder_id,
                    display_name: bid.bidder_display.clone(),
                    highest_amount: bid.amount,
                    bid_count: 0,
                });
            entry.bid_count += 1;
            entry.highest_amount = entry.highest_amount.max(bid.amount);
        }
        let mut participants: Vec<Participant> = by_bidder.into_values().collect();
        participants.sort_by(|a, b| {
            b.highest_amount
                .cmp(&a.highest_amount)
                .then(a.bidder_id.cmp(&b.bidder_id))
        });
        participants
    }

    /// Advisory pre-check for the submit control. The server re-validates
    /// regardless; this only avoids obviously doomed requests.
    pub fn min_accepted_bid(&self) -> i64 {
        self.auction.min_accepted_bid()
    }

    /// Submit gate: last server-confirmed status, never the countdown alone.
    pub fn can_submit(&self, now: DateTime<Utc>) -> bool {
        self.auction.effective_status(now) == crate::auction::model::AuctionStatus::Active
    }

    /// After a successful submission the submitter cannot rely on hearing
    /// its own broadcast unless the channel is live.
    pub fn needs_refetch_after_submit(&self) -> bool {
        self.live_status != LiveStatus::Connected
    }
}

// endregion: --- Auction View

// region:    --- Tests


// endregion: --- Tests
