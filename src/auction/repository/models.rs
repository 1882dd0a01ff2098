use {
    crate::auction::entities::{
        Auction,
        AuctionStatus,
    },
    sqlx::prelude::FromRow,
    time::OffsetDateTime,
};

#[derive(Clone, FromRow)]
pub struct AuctionRow {
    pub id:          String,
    pub seller_id:   String,
    pub starts_at:   OffsetDateTime,
    pub ends_at:     OffsetDateTime,
    pub status:      String,
    pub high_bid:    f64,
    pub high_bidder: String,
}

impl From<AuctionRow> for Auction {
    fn from(row: AuctionRow) -> Self {
        Auction {
            id:          row.id,
            seller_id:   row.seller_id,
            starts_at:   row.starts_at,
            ends_at:     row.ends_at,
            status:      row.status.parse().unwrap_or(AuctionStatus::Pending),
            high_bid:    row.high_bid,
            high_bidder: row.high_bidder,
        }
    }
}

/// One accepted bid as it appears in the append-only bid stream.
#[derive(Clone, Debug, PartialEq)]
pub struct BidRecord {
    pub auction_id: String,
    pub bidder_id:  String,
    pub amount:     f64,
    pub placed_at:  i64,
}
