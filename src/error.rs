// region:    --- Imports
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

// endregion: --- Imports

// region:    --- Not-Active Reason

/// Why an auction refuses bids right now. Carried inside
/// [`BidError::AuctionNotActive`] so clients can localize without
/// matching on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotActiveReason {
    NotStarted,
    Ended,
    Cancelled,
    UnderReview,
}

impl NotActiveReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotActiveReason::NotStarted => "not_started",
            NotActiveReason::Ended => "ended",
            NotActiveReason::Cancelled => "cancelled",
            NotActiveReason::UnderReview => "under_review",
        }
    }
}

impl std::fmt::Display for NotActiveReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// endregion: --- Not-Active Reason

// region:    --- Bid Error

/// Error taxonomy for the bidding core. Every variant maps to a stable
/// machine-readable code; handlers never rely on message wording.
#[derive(Debug, Error)]
pub enum BidError {
    #[error("auction {0} not found")]
    AuctionNotFound(i64),

    #[error("bidder {0} not found")]
    BidderNotFound(i64),

    #[error("auction is not active ({reason})")]
    AuctionNotActive { reason: NotActiveReason },

    #[error("bid must be at least {minimum}")]
    BidTooLow { minimum: i64 },

    #[error("bid amount must be positive")]
    InvalidAmount,

    #[error("storage error: {0}")]
    Storage(String),
}

impl BidError {
    /// Stable error code shared with clients.
    pub fn code(&self) -> &'static str {
        match self {
            BidError::AuctionNotFound(_) => "AUCTION_NOT_FOUND",
            BidError::BidderNotFound(_) => "BIDDER_NOT_FOUND",
            BidError::AuctionNotActive { .. } => "AUCTION_NOT_ACTIVE",
            BidError::BidTooLow { .. } => "BID_TOO_LOW",
            BidError::InvalidAmount => "INVALID_AMOUNT",
            BidError::Storage(_) => "STORAGE_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            BidError::AuctionNotFound(_) | BidError::BidderNotFound(_) => StatusCode::NOT_FOUND,
            BidError::AuctionNotActive { .. }
            | BidError::BidTooLow { .. }
            | BidError::InvalidAmount => StatusCode::BAD_REQUEST,
            BidError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Rejections never mutate state; only storage failures are worth a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BidError::Storage(_))
    }
}

impl From<sqlx::Error> for BidError {
    fn from(err: sqlx::Error) -> Self {
        BidError::Storage(err.to_string())
    }
}

impl IntoResponse for BidError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.to_string(),
            "code": self.code(),
        });

        // Detail fields clients act on (e.g. pre-filling the next valid bid).
        match &self {
            BidError::BidTooLow { minimum } => {
                body["minimum"] = json!(minimum);
            }
            BidError::AuctionNotActive { reason } => {
                body["reason"] = json!(reason.as_str());
            }
            _ => {}
        }

        (self.status_code(), Json(body)).into_response()
    }
}

// endregion: --- Bid Error

// region:    --- Tests


// endregion: --- Tests
