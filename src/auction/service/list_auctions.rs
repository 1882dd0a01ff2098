use {
    super::{
        AuctionError,
        Service,
    },
    crate::auction::entities::{
        Auction,
        AuctionStatus,
    },
};

const DEFAULT_LIMIT: i64 = 10;

pub struct ListAuctionsInput {
    pub status: Option<String>,
    pub limit:  i64,
    pub offset: i64,
}

impl Service {
    #[tracing::instrument(skip_all)]
    pub async fn list_auctions(
        &self,
        input: ListAuctionsInput,
    ) -> Result<Vec<Auction>, AuctionError> {
        let limit = if input.limit == 0 { DEFAULT_LIMIT } else { input.limit };
        // Only RUNNING and FINISHED act as filters; anything else means
        // "no filter".
        let status = input
            .status
            .as_deref()
            .and_then(|s| s.parse::<AuctionStatus>().ok())
            .filter(|s| matches!(s, AuctionStatus::Running | AuctionStatus::Finished));

        Ok(self.repo.list_auctions(status, limit, input.offset).await?)
    }
}
