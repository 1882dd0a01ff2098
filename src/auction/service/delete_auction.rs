use {
    super::{
        AuctionError,
        Service,
    },
    crate::{
        auction::entities::AuctionStatus,
        kernel::kv,
    },
    redis::AsyncCommands,
};

impl Service {
    /// Removes every trace of an auction, provided it is not RUNNING in
    /// either store. Relational rows go first (transactionally); the KV purge
    /// is best-effort since the keys are disposable.
    #[tracing::instrument(skip_all, fields(auction_id = id))]
    pub async fn delete_auction(&self, id: &str) -> Result<(), AuctionError> {
        let mut conn = self.kv();

        let live_status: Option<String> = conn
            .hget(kv::auction_key(id), "st")
            .await
            .unwrap_or_default();
        if live_status.as_deref() == Some(AuctionStatus::Running.as_str()) {
            return Err(AuctionError::Running);
        }

        let db_status = self.repo.get_auction_status(id).await?;
        if db_status == Some(AuctionStatus::Running) {
            return Err(AuctionError::Running);
        }
        if db_status.is_none() && live_status.is_none() {
            return Err(AuctionError::NotFound);
        }

        self.repo.delete_auction(id).await?;

        let auction_key = kv::auction_key(id);
        if let Err(err) = conn
            .del::<_, ()>(vec![auction_key.clone(), kv::timer_key(id)])
            .await
        {
            tracing::warn!(error = ?err, auction_id = id, "Failed to purge live keys.");
        }
        for set in [kv::ACTIVE_SET, kv::ENDED_SET] {
            if let Err(err) = conn.srem::<_, _, ()>(set, &auction_key).await {
                tracing::warn!(error = ?err, auction_id = id, set, "Failed to purge set member.");
            }
        }
        Ok(())
    }
}
