/// Auction snapshot by id.
pub const GET_AUCTION: &str = r#"
    SELECT id, product_id, seller_id, starting_price, current_price, minimum_increment,
           start_time, end_time, status, total_bids, created_at, updated_at
    FROM auctions
    WHERE id = $1
"#;

/// Auction snapshot by id, locking the row for the duration of the
/// transaction. Serializes concurrent bids on the same auction.
pub const GET_AUCTION_FOR_UPDATE: &str = r#"
    SELECT id, product_id, seller_id, starting_price, current_price, minimum_increment,
           start_time, end_time, status, total_bids, created_at, updated_at
    FROM auctions
    WHERE id = $1
    FOR UPDATE
"#;

/// Auction list base; optional filters are appended by the caller.
pub const LIST_AUCTIONS: &str = r#"
    SELECT id, product_id, seller_id, starting_price, current_price, minimum_increment,
           start_time, end_time, status, total_bids, created_at, updated_at
    FROM auctions
"#;

/// Bid history with bidder display fields, most recent first.
pub const GET_BID_HISTORY: &str = r#"
    SELECT b.id, b.auction_id, b.bidder_id, b.amount, b.created_at,
           u.full_name AS bidder_name, u.email AS bidder_email
    FROM bids b
    LEFT JOIN bidders u ON u.id = b.bidder_id
    WHERE b.auction_id = $1
    ORDER BY b.created_at DESC, b.id DESC
"#;

/// Bidder existence check for the place-bid input constraint.
pub const GET_BIDDER: &str = "SELECT id, full_name, email FROM bidders WHERE id = $1";

/// Append an accepted bid to the ledger.
pub const INSERT_BID: &str = r#"
    INSERT INTO bids (auction_id, bidder_id, amount, created_at)
    VALUES ($1, $2, $3, $4)
    RETURNING id
"#;

/// Fold an accepted bid into the auction aggregate.
pub const UPDATE_AUCTION_AGGREGATE: &str = r#"
    UPDATE auctions
    SET current_price = $1, total_bids = total_bids + 1, updated_at = $2
    WHERE id = $3
    RETURNING id, product_id, seller_id, starting_price, current_price, minimum_increment,
              start_time, end_time, status, total_bids, created_at, updated_at
"#;

/// Scheduler: open auctions whose start time has passed.
pub const ACTIVATE_DUE_AUCTIONS: &str = r#"
    UPDATE auctions SET status = 'active', updated_at = $1
    WHERE status = 'scheduled' AND start_time <= $1
"#;

/// Scheduler: close auctions whose end time has passed.
pub const END_DUE_AUCTIONS: &str = r#"
    UPDATE auctions SET status = 'ended', updated_at = $1
    WHERE status = 'active' AND end_time <= $1
"#;
