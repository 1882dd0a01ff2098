use {
    super::{
        AuctionError,
        Service,
    },
    crate::kernel::kv,
    std::time::Duration,
    time::OffsetDateTime,
};

/// End-to-end deadline for one bid on the hot path.
const PLACE_BID_DEADLINE: Duration = Duration::from_millis(1500);

pub struct PlaceBidInput {
    pub id:        String,
    pub bidder_id: String,
    pub amount:    f64,
}

impl Service {
    /// Runs the atomic `auction_place_bid` entrypoint. All arbitration
    /// (monotonicity, increment, tie rejection), the stream append and the
    /// event publish happen inside the store, serialized per auction.
    #[tracing::instrument(skip_all, fields(auction_id = input.id, bidder = input.bidder_id))]
    pub async fn place_bid(&self, input: PlaceBidInput) -> Result<(), AuctionError> {
        let mut conn = self.kv();
        let mut cmd = kv::fcall("auction_place_bid", &input.id);
        cmd.arg(&input.bidder_id)
            .arg(input.amount)
            .arg(OffsetDateTime::now_utc().unix_timestamp())
            .arg(self.min_increment);

        tokio::time::timeout(PLACE_BID_DEADLINE, cmd.query_async::<_, ()>(&mut conn))
            .await
            .map_err(|_| AuctionError::Internal(anyhow::anyhow!("place_bid timed out")))??;
        Ok(())
    }
}
