use {
    super::{
        AuctionError,
        Service,
    },
    crate::{
        auction::entities::LiveAuction,
        kernel::kv,
    },
    redis::AsyncCommands,
    std::collections::HashMap,
};

/// Safety expiry for the settlement mutex; bounds the blast radius of a
/// worker crash mid-settlement.
const SETTLEMENT_LOCK_TTL_SECS: u64 = 5;

impl Service {
    /// At-most-once settlement. Idempotent: losing the mutex race, or finding
    /// the hash already cleaned up, are both silent successes — the winner of
    /// the race performs the identical relational upsert.
    #[tracing::instrument(skip_all, fields(auction_id = id))]
    pub async fn finalize(&self, id: &str) -> Result<(), AuctionError> {
        let mut conn = self.kv();
        let lock_key = kv::lock_key(id);

        let acquired: Option<String> = redis::cmd("SET")
            .arg(&lock_key)
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(SETTLEMENT_LOCK_TTL_SECS)
            .query_async(&mut conn)
            .await
            .unwrap_or_else(|err| {
                tracing::warn!(error = ?err, "Settlement lock probe failed.");
                None
            });
        if acquired.is_none() {
            // another worker is already finalising the same auction
            return Ok(());
        }

        let result = self.settle(id, &mut conn).await;
        if let Err(err) = conn.del::<_, ()>(&lock_key).await {
            tracing::warn!(error = ?err, auction_id = id, "Failed to release settlement lock.");
        }
        result
    }

    async fn settle(
        &self,
        id: &str,
        conn: &mut redis::aio::ConnectionManager,
    ) -> Result<(), AuctionError> {
        let hash: HashMap<String, String> = conn.hgetall(kv::auction_key(id)).await?;
        if hash.is_empty() {
            return Ok(());
        }
        let snapshot = LiveAuction::from_hash(&hash);

        self.repo.settle_auction(id, &snapshot).await?;

        // broadcast the end event and drop the live keys
        let cmd = kv::fcall("auction_stop", id);
        cmd.query_async::<_, ()>(conn).await?;
        Ok(())
    }
}
