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

impl Repository {
    /// Paginated listing ordered by `ends_at` descending, optionally filtered
    /// by status.
    pub async fn list_auctions(
        &self,
        status: Option<AuctionStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Auction>, sqlx::Error> {
        const BASE: &str = "SELECT id, seller_id, starts_at, ends_at, status,
                    coalesce(high_bid, 0) AS high_bid, coalesce(high_bidder, '') AS high_bidder
               FROM auctions";

        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, AuctionRow>(&format!(
                    "{BASE} WHERE status = $1 ORDER BY ends_at DESC LIMIT $2 OFFSET $3"
                ))
                .bind(status.as_str())
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.db)
                .await?
            }
            None => {
                sqlx::query_as::<_, AuctionRow>(&format!(
                    "{BASE} ORDER BY ends_at DESC LIMIT $1 OFFSET $2"
                ))
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.db)
                .await?
            }
        };
        Ok(rows.into_iter().map(Auction::from).collect())
    }
}
