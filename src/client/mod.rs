//! Client-side pieces of the bidding flow: a reconnecting realtime
//! connection, the auction-view merge logic, and the countdown primitive.
//! All authoritative decisions stay server-side; this module only keeps a
//! local view convergent with the ledger.

pub mod connection;
pub mod countdown;
pub mod view;

pub use connection::{LiveStatus, RealtimeClient, RealtimeConfig, TokenProvider};
pub use countdown::{countdown, Countdown, CountdownStatus, CountdownTicker};
pub use view::{AuctionView, LeaderLabel, Participant};
