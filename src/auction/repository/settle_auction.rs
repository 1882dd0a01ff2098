use {
    super::Repository,
    crate::auction::entities::LiveAuction,
};

impl Repository {
    /// Writes the settlement outcome in one transaction: the auction row is
    /// upserted as FINISHED from the KV snapshot, and the winning bid (if
    /// any) is recorded idempotently.
    ///
    /// Upsert rather than update-only: an auction can finalize before the
    /// periodic reconciler ever mirrored its row.
    #[tracing::instrument(skip_all, fields(auction_id = id))]
    pub async fn settle_auction(
        &self,
        id: &str,
        snapshot: &LiveAuction,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.db.begin().await?;

        sqlx::query(
            "INSERT INTO auctions (id, seller_id, item, starts_at, ends_at,
                                   status, high_bid, high_bidder)
                  VALUES ($1, $2, '', to_timestamp($3), to_timestamp($4),
                          'FINISHED', $5, $6)
             ON CONFLICT (id) DO UPDATE
                     SET status      = 'FINISHED',
                         high_bid    = EXCLUDED.high_bid,
                         high_bidder = EXCLUDED.high_bidder",
        )
        .bind(id)
        .bind(&snapshot.seller_id)
        .bind(snapshot.starts_at)
        .bind(snapshot.ends_at)
        .bind(snapshot.high_bid)
        .bind(&snapshot.high_bidder)
        .execute(&mut *tx)
        .await?;

        if snapshot.high_bid > 0.0 && !snapshot.high_bidder.is_empty() {
            sqlx::query(
                "INSERT INTO bids (auction_id, bidder_id, amount)
                      VALUES ($1, $2, $3)
                 ON CONFLICT DO NOTHING",
            )
            .bind(id)
            .bind(&snapshot.high_bidder)
            .bind(snapshot.high_bid)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }
}
