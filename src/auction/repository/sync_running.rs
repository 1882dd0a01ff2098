use {
    super::Repository,
    crate::auction::entities::LiveAuction,
};

impl Repository {
    /// Mirrors running-auction snapshots into the relational store, all in
    /// one transaction per reconciler tick. On conflict only the high bid
    /// fields move; a FINISHED row is never touched, so the mirror can race
    /// finalization without resurrecting a settled auction.
    #[tracing::instrument(skip_all, fields(count = snapshots.len()))]
    pub async fn sync_running(
        &self,
        snapshots: &[(String, LiveAuction)],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.db.begin().await?;
        for (id, live) in snapshots {
            sqlx::query(
                "INSERT INTO auctions (id, seller_id, item, starts_at, ends_at,
                                       status, high_bid, high_bidder)
                      VALUES ($1, $2, '', to_timestamp($3), to_timestamp($4),
                              'RUNNING', $5, $6)
                 ON CONFLICT (id) DO UPDATE
                         SET high_bid    = EXCLUDED.high_bid,
                             high_bidder = EXCLUDED.high_bidder
                       WHERE auctions.status <> 'FINISHED'",
            )
            .bind(id)
            .bind(&live.seller_id)
            .bind(live.starts_at)
            .bind(live.ends_at)
            .bind(live.high_bid)
            .bind(&live.high_bidder)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await
    }
}
