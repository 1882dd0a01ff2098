use {
    super::Repository,
    time::OffsetDateTime,
};

impl Repository {
    /// Inserts the PENDING draft row. Fails with a unique violation when the
    /// id is already taken, whatever state that auction is in.
    #[tracing::instrument(skip_all, fields(auction_id = id))]
    pub async fn add_auction(
        &self,
        id: &str,
        seller_id: &str,
        item: &str,
        ends_at: OffsetDateTime,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO auctions (id, seller_id, item, starts_at, ends_at, status)
                  VALUES ($1, $2, $3, now(), $4, 'PENDING')",
        )
        .bind(id)
        .bind(seller_id)
        .bind(item)
        .bind(ends_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}
