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
    /// Early close by the seller (or the system). Runs the usual settlement
    /// path, which is idempotent.
    #[tracing::instrument(skip_all, fields(auction_id = id))]
    pub async fn stop_auction(&self, id: &str) -> Result<(), AuctionError> {
        if let Some(AuctionStatus::Finished) = self.repo.get_auction_status(id).await? {
            return Err(AuctionError::AlreadyFinished);
        }

        self.finalize(id).await?;

        // The timer key may survive a settlement that raced cleanup; without
        // this delete its eventual expiry would trigger a pointless finalize.
        let mut conn = self.kv();
        if let Err(err) = conn.del::<_, ()>(kv::timer_key(id)).await {
            tracing::warn!(error = ?err, auction_id = id, "Failed to remove timer key.");
        }
        Ok(())
    }
}
