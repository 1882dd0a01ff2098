use super::Repository;

impl Repository {
    /// Removes the auction and its bid history in one transaction. Returns
    /// the number of auction rows deleted (0 when only KV state existed).
    #[tracing::instrument(skip_all, fields(auction_id = id))]
    pub async fn delete_auction(&self, id: &str) -> Result<u64, sqlx::Error> {
        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM bids WHERE auction_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM auctions WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted)
    }
}
