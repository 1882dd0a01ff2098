use super::{
    BidRecord,
    Repository,
};

impl Repository {
    /// Persists a batch of bid-stream records in one transaction. The unique
    /// index on (auction_id, bidder_id, amount, placed_at) makes replays
    /// after a crash no-ops.
    #[tracing::instrument(skip_all, fields(count = records.len()))]
    pub async fn add_bids(&self, records: &[BidRecord]) -> Result<(), sqlx::Error> {
        let mut tx = self.db.begin().await?;
        for record in records {
            sqlx::query(
                "INSERT INTO bids (auction_id, bidder_id, amount, placed_at)
                      VALUES ($1, $2, $3, to_timestamp($4))
                 ON CONFLICT DO NOTHING",
            )
            .bind(&record.auction_id)
            .bind(&record.bidder_id)
            .bind(record.amount)
            .bind(record.placed_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await
    }
}
