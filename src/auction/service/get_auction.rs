use {
    super::{
        AuctionError,
        Service,
    },
    crate::{
        auction::entities::{
            Auction,
            LiveAuction,
        },
        kernel::kv,
    },
    redis::AsyncCommands,
    std::collections::HashMap,
};

impl Service {
    /// Raw KV hash of a running auction; empty when the auction is not live.
    pub async fn live_snapshot(
        &self,
        id: &str,
    ) -> Result<HashMap<String, String>, AuctionError> {
        let mut conn = self.kv();
        Ok(conn.hgetall(kv::auction_key(id)).await?)
    }

    /// Fast path: a RUNNING auction is served straight from the KV hash; the
    /// relational row is only consulted otherwise. Reading the mirror row for
    /// a live auction would return stale bids.
    #[tracing::instrument(skip_all, fields(auction_id = id))]
    pub async fn get_auction(&self, id: &str) -> Result<Auction, AuctionError> {
        let hash = self.live_snapshot(id).await.unwrap_or_default();
        if !hash.is_empty() {
            let live = LiveAuction::from_hash(&hash);
            if live.is_running() {
                return Ok(live.into_auction(id.to_string()));
            }
        }

        self.repo
            .get_auction(id)
            .await?
            .ok_or(AuctionError::NotFound)
    }
}
