use {
    super::{
        AuctionRow,
        Repository,
    },
    crate::auction::entities::{
        Auction,
        AuctionStatus,
    },
};

const SELECT_AUCTION: &str = "SELECT id, seller_id, starts_at, ends_at, status,
            coalesce(high_bid, 0) AS high_bid, coalesce(high_bidder, '') AS high_bidder
       FROM auctions WHERE id = $1";

impl Repository {
    pub async fn get_auction(&self, id: &str) -> Result<Option<Auction>, sqlx::Error> {
        let row = sqlx::query_as::<_, AuctionRow>(SELECT_AUCTION)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(Auction::from))
    }

    pub async fn get_auction_status(
        &self,
        id: &str,
    ) -> Result<Option<AuctionStatus>, sqlx::Error> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM auctions WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.db)
                .await?;
        Ok(status.and_then(|s| s.parse().ok()))
    }
}
