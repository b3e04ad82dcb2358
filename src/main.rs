// region:    --- Imports
use auction_bidding_service::database::DatabaseManager;
use auction_bidding_service::handlers;
use auction_bidding_service::ledger::{BidLedger, MemoryLedger, PostgresLedger};
use auction_bidding_service::realtime::AuctionBroadcaster;
use auction_bidding_service::scheduler::AuctionScheduler;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

// endregion: --- Imports

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    // Ledger selection: Postgres in production, in-memory for local runs.
    let ledger: Arc<dyn BidLedger> = match std::env::var("BIDDING_STORE").as_deref() {
        Ok("memory") => {
            info!("{:<12} --> using in-memory ledger (demo data seeded)", "Main");
            Arc::new(seed_demo_ledger())
        }
        _ => {
            let database_url = std::env::var("DATABASE_URL")?;
            let db_manager = Arc::new(DatabaseManager::new(&database_url).await?);

            if std::env::var("RESET_DB").as_deref() == Ok("1") {
                db_manager.reset_database().await?;
            } else {
                db_manager.initialize_database().await?;
            }
            info!("{:<12} --> database ready", "Main");

            // Keeps stored statuses in step with the clock for list views.
            let scheduler = AuctionScheduler::new(db_manager.get_pool());
            scheduler.start().await;

            Arc::new(PostgresLedger::new(db_manager.get_pool()))
        }
    };

    let broadcaster = Arc::new(AuctionBroadcaster::new());

    // CORS for the browser clients.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let routes_all = handlers::app(ledger, broadcaster).layer(cors);

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&bind_addr).await?;
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr()?
    );

    if let Err(err) = axum::serve(listener, routes_all.into_make_service()).await {
        error!("{:<12} --> Server error: {}", "Main", err);
    }
    Ok(())
}

/// Demo fixture for `BIDDING_STORE=memory` runs: one live auction and a
/// couple of bidders, enough to exercise the whole flow by hand.
fn seed_demo_ledger() -> MemoryLedger {
    let ledger = MemoryLedger::new();
    ledger.register_bidder(1, Some("Fatima Al-Rashid"), Some("fatima@example.com"));
    ledger.register_bidder(2, Some("Khalid Mansour"), Some("khalid@example.com"));
    let now = Utc::now();
    let auction = ledger.create_auction(1, 1, 10_000, 500, now, now + Duration::hours(2));
    info!(
        "{:<12} --> demo auction {} open until {}",
        "Main", auction.id, auction.end_time
    );
    ledger
}
// endregion: --- Main
