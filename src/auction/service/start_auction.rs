use {
    super::{
        AuctionError,
        Service,
    },
    crate::{
        auction::entities::AuctionStatus,
        kernel::kv,
    },
    std::time::Duration,
    time::OffsetDateTime,
};

const STATUS_PROBE_DEADLINE: Duration = Duration::from_secs(2);

pub struct StartAuctionInput {
    pub id:        String,
    pub seller_id: String,
    pub ends_at:   OffsetDateTime,
}

impl Service {
    /// Opens bidding: creates the disposable KV hash plus its companion TTL
    /// key via the atomic `auction_start` entrypoint.
    #[tracing::instrument(skip_all, fields(auction_id = input.id))]
    pub async fn start_auction(&self, input: StartAuctionInput) -> Result<(), AuctionError> {
        let now = OffsetDateTime::now_utc();
        let ttl = (input.ends_at - now).whole_seconds();
        if ttl <= 0 {
            return Err(AuctionError::Closed);
        }

        // Relational sanity probe, bounded so a slow DB cannot stall starts.
        let status = tokio::time::timeout(
            STATUS_PROBE_DEADLINE,
            self.repo.get_auction_status(&input.id),
        )
        .await
        .map_err(|_| AuctionError::Internal(anyhow::anyhow!("status probe timed out")))??;
        match status {
            Some(AuctionStatus::Running) => return Err(AuctionError::AlreadyRunning),
            Some(AuctionStatus::Finished) => return Err(AuctionError::AlreadyFinished),
            _ => {}
        }

        let mut conn = self.kv();
        let mut cmd = kv::fcall("auction_start", &input.id);
        cmd.arg(&input.seller_id)
            .arg(now.unix_timestamp())
            .arg(input.ends_at.unix_timestamp())
            .arg(ttl);
        cmd.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }
}
