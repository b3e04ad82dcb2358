/// Realtime fan-out of accepted bids.
///
/// Rooms are keyed by auction id; clients join on viewing an auction and
/// leave on navigating away. Membership is not preserved across
/// disconnects, so clients re-join after every reconnect. Delivery is
/// best-effort: a failed send drops that one subscriber, never the bid.
// region:    --- Imports
use crate::auction::model::BidView;
use axum::extract::ws::{Message, WebSocket};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

// endregion: --- Imports

// region:    --- Wire Contract

/// Payload of the `auction:update` event. Self-sufficient: clients update
/// price, history and counts without a follow-up fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionUpdate {
    pub auction_id: i64,
    pub bid: BidView,
    pub current_price: i64,
    pub total_bids: i64,
    pub placed_at: DateTime<Utc>,
}

/// Client-to-server frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ClientFrame {
    #[serde(rename = "auction:join")]
    Join {
        #[serde(rename = "auctionId")]
        auction_id: i64,
    },
    #[serde(rename = "auction:leave")]
    Leave {
        #[serde(rename = "auctionId")]
        auction_id: i64,
    },
}

/// Server-to-client frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum ServerFrame {
    #[serde(rename = "auction:joined")]
    Joined {
        #[serde(rename = "auctionId")]
        auction_id: i64,
    },
    #[serde(rename = "auction:update")]
    Update(AuctionUpdate),
}

// endregion: --- Wire Contract

// region:    --- Broadcaster

type RoomMembers = HashMap<u64, mpsc::UnboundedSender<ServerFrame>>;

/// Room registry and fan-out. Read-only with respect to auction state:
/// it only ever forwards the post-mutation snapshot handed to it.
#[derive(Default)]
pub struct AuctionBroadcaster {
    rooms: DashMap<i64, RoomMembers>,
    next_conn_id: AtomicU64,
}

impl AuctionBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_conn_id(&self) -> u64 {
        self.next_conn_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Add a connection to an auction room. Idempotent: re-joining
    /// replaces the previous sender and re-emits the ack.
    pub fn join(&self, auction_id: i64, conn_id: u64, tx: mpsc::UnboundedSender<ServerFrame>) {
        self.rooms
            .entry(auction_id)
            .or_default()
            .insert(conn_id, tx.clone());
        let _ = tx.send(ServerFrame::Joined { auction_id });
        debug!(
            "{:<12} --> conn {} joined room auction:{}",
            "Realtime", conn_id, auction_id
        );
    }

    /// Remove a connection from a room. Idempotent.
    pub fn leave(&self, auction_id: i64, conn_id: u64) {
        if let Some(mut members) = self.rooms.get_mut(&auction_id) {
            members.remove(&conn_id);
        }
        self.rooms.remove_if(&auction_id, |_, members| members.is_empty());
        debug!(
            "{:<12} --> conn {} left room auction:{}",
            "Realtime", conn_id, auction_id
        );
    }

    /// Fan an accepted bid out to the auction's room. Returns the number
    /// of subscribers reached; senders that fail are evicted.
    pub fn broadcast(&self, update: AuctionUpdate) -> usize {
        let auction_id = update.auction_id;
        let mut delivered = 0;
        if let Some(mut members) = self.rooms.get_mut(&auction_id) {
            members.retain(|conn_id, tx| {
                match tx.send(ServerFrame::Update(update.clone())) {
                    Ok(()) => {
                        delivered += 1;
                        true
                    }
                    Err(_) => {
                        debug!(
                            "{:<12} --> dropping stale conn {} from auction:{}",
                            "Realtime", conn_id, auction_id
                        );
                        false
                    }
                }
            });
        }
        info!(
            "{:<12} --> auction:update for {} delivered to {} subscriber(s)",
            "Realtime", auction_id, delivered
        );
        delivered
    }

    /// Subscribers currently in an auction's room.
    pub fn room_size(&self, auction_id: i64) -> usize {
        self.rooms.get(&auction_id).map_or(0, |m| m.len())
    }
}

// endregion: --- Broadcaster

// region:    --- Socket Loop

/// Drive one subscriber connection: outbound frame pump plus the
/// join/leave command loop. Rooms joined here are torn down on close.
pub async fn handle_socket(
    socket: WebSocket,
    broadcaster: Arc<AuctionBroadcaster>,
    authenticated: bool,
) {
    let conn_id = broadcaster.next_conn_id();
    info!(
        "{:<12} --> conn {} opened (authenticated: {})",
        "Realtime", conn_id, authenticated
    );

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerFrame>();

    // Outbound frames, serialized off the room registry.
    let send_loop = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let json = match serde_json::to_string(&frame) {
                Ok(json) => json,
                Err(err) => {
                    warn!("{:<12} --> frame serialization failed: {}", "Realtime", err);
                    continue;
                }
            };
            if ws_tx.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    // Inbound join/leave commands. Joined rooms are tracked per connection
    // so the registry can be cleaned up on close.
    let mut joined: HashSet<i64> = HashSet::new();
    while let Some(message) = ws_rx.next().await {
        let message = match message {
            Ok(message) => message,
            Err(_) => break,
        };
        match message {
            Message::Text(text) => match serde_json::from_str::<ClientFrame>(&text) {
                Ok(ClientFrame::Join { auction_id }) if auction_id > 0 => {
                    joined.insert(auction_id);
                    broadcaster.join(auction_id, conn_id, tx.clone());
                }
                Ok(ClientFrame::Leave { auction_id }) => {
                    joined.remove(&auction_id);
                    broadcaster.leave(auction_id, conn_id);
                }
                Ok(ClientFrame::Join { .. }) => {
                    debug!("{:<12} --> ignoring join with bad auction id", "Realtime");
                }
                Err(err) => {
                    debug!("{:<12} --> unparseable frame: {}", "Realtime", err);
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    for auction_id in joined {
        broadcaster.leave(auction_id, conn_id);
    }
    send_loop.abort();
    info!("{:<12} --> conn {} closed", "Realtime", conn_id);
}

// endregion: --- Socket Loop

// region:    --- Tests


// endregion: --- Tests
