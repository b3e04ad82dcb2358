pub mod auction;
pub mod bidding;
pub mod client;
pub mod database;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod query;
pub mod realtime;
pub mod scheduler;
