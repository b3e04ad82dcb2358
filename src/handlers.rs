// region:    --- Imports
use crate::bidding::commands::PlaceBidCommand;
use crate::error::BidError;
use crate::ledger::{AuctionFilter, BidLedger};
use crate::realtime::{self, AuctionBroadcaster, AuctionUpdate};
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

// endregion: --- Imports

/// Shared handler state: the ledger and the realtime fan-out.
pub type AppState = (Arc<dyn BidLedger>, Arc<AuctionBroadcaster>);

/// Full route table. Tests mount this against an in-memory ledger.
pub fn app(ledger: Arc<dyn BidLedger>, broadcaster: Arc<AuctionBroadcaster>) -> Router {
    Router::new()
        .route("/auctions", get(handle_list_auctions))
        .route("/auctions/:id", get(handle_get_auction))
        .route(
            "/auctions/:id/bids",
            get(handle_get_bid_history).post(handle_place_bid),
        )
        .route("/auctions/:id/highest-bid", get(handle_get_highest_bid))
        .route("/ws", get(handle_ws))
        .with_state((ledger, broadcaster))
}

// region:    --- Command Handlers

#[derive(Debug, Deserialize)]
pub struct PlaceBidBody {
    pub bidder_id: i64,
    pub amount: i64,
}

/// Accept or reject a bid, then fan the accepted bid out to the room.
///
/// The ledger write is authoritative: a broadcast that reaches nobody (or
/// fails entirely) never rolls the bid back.
pub async fn handle_place_bid(
    State((ledger, broadcaster)): State<AppState>,
    Path(auction_id): Path<i64>,
    Json(body): Json<PlaceBidBody>,
) -> Result<impl IntoResponse, BidError> {
    info!(
        "{:<12} --> bid attempt: auction {} bidder {} amount {}",
        "Command", auction_id, body.bidder_id, body.amount
    );

    let cmd = PlaceBidCommand {
        auction_id,
        bidder_id: body.bidder_id,
        amount: body.amount,
    };
    let accepted = ledger.place_bid(cmd, Utc::now()).await?;

    let update = AuctionUpdate {
        auction_id,
        bid: accepted.bid.clone(),
        current_price: accepted.auction.current_price,
        total_bids: accepted.auction.total_bids,
        placed_at: accepted.bid.created_at,
    };
    let delivered = broadcaster.broadcast(update);
    if delivered == 0 {
        // Disconnected viewers reconcile by re-fetching on reconnect.
        warn!(
            "{:<12} --> no live subscribers for auction {}",
            "Command", auction_id
        );
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "bid": accepted.bid,
            "auction": accepted.auction,
        })),
    ))
}

// endregion: --- Command Handlers

// region:    --- Query Handlers

/// Auction list with optional status/seller/product filters.
pub async fn handle_list_auctions(
    State((ledger, _)): State<AppState>,
    Query(filter): Query<AuctionFilter>,
) -> Result<impl IntoResponse, BidError> {
    info!("{:<12} --> list auctions: {:?}", "Query", filter);
    let auctions = ledger.list_auctions(&filter).await?;
    Ok(Json(auctions))
}

/// Auction snapshot.
pub async fn handle_get_auction(
    State((ledger, _)): State<AppState>,
    Path(auction_id): Path<i64>,
) -> Result<impl IntoResponse, BidError> {
    info!("{:<12} --> get auction id: {}", "Query", auction_id);
    let auction = ledger.auction(auction_id).await?;
    Ok(Json(auction))
}

/// Bid history, most recent first, bidder identity masked.
pub async fn handle_get_bid_history(
    State((ledger, _)): State<AppState>,
    Path(auction_id): Path<i64>,
) -> Result<impl IntoResponse, BidError> {
    info!("{:<12} --> get bid history id: {}", "Query", auction_id);
    // Listing bids for an unknown auction is a 404, not an empty list.
    ledger.auction(auction_id).await?;
    let bids = ledger.bids(auction_id).await?;
    Ok(Json(bids))
}

/// Current leader bid.
pub async fn handle_get_highest_bid(
    State((ledger, _)): State<AppState>,
    Path(auction_id): Path<i64>,
) -> Result<impl IntoResponse, BidError> {
    info!("{:<12} --> get highest bid id: {}", "Query", auction_id);
    ledger.auction(auction_id).await?;
    let highest = ledger.highest_bid(auction_id).await?;
    Ok(Json(highest))
}

// endregion: --- Query Handlers

// region:    --- Realtime Endpoint

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// Upgrade to the realtime channel. The token is a connection credential
/// handled by the auth collaborator; here its presence is only recorded.
pub async fn handle_ws(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State((_, broadcaster)): State<AppState>,
) -> impl IntoResponse {
    let authenticated = params.token.as_deref().is_some_and(|t| !t.is_empty());
    ws.on_upgrade(move |socket| realtime::handle_socket(socket, broadcaster, authenticated))
}

// endregion: --- Realtime Endpoint
