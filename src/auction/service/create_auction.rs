use {
    super::{
        AuctionError,
        Service,
    },
    crate::auction::entities::AuctionId,
    time::{
        Duration,
        OffsetDateTime,
    },
    uuid::Uuid,
};

/// Drafts must leave at least this much room before they can end.
const MIN_AUCTION_WINDOW: Duration = Duration::seconds(30);

pub struct CreateAuctionInput {
    pub id:        Option<String>,
    pub seller_id: String,
    pub item:      String,
    pub ends_at:   OffsetDateTime,
}

impl Service {
    /// Persists a PENDING draft row. The auction only opens for bidding once
    /// `start_auction` runs.
    #[tracing::instrument(skip_all, fields(auction_id))]
    pub async fn create_auction(
        &self,
        input: CreateAuctionInput,
    ) -> Result<AuctionId, AuctionError> {
        let id = match input.id {
            Some(id) if !id.is_empty() => id,
            _ => Uuid::new_v4().to_string(),
        };
        tracing::Span::current().record("auction_id", id.as_str());

        if input.ends_at < OffsetDateTime::now_utc() + MIN_AUCTION_WINDOW {
            return Err(AuctionError::Closed);
        }

        self.repo
            .add_auction(&id, &input.seller_id, &input.item, input.ends_at)
            .await
            .map_err(|err| match err.as_database_error() {
                Some(db_err) if db_err.is_unique_violation() => AuctionError::Exists,
                _ => err.into(),
            })?;
        Ok(id)
    }
}
