use {
    super::{
        ApiState,
        ErrorBodyResponse,
        RestError,
    },
    crate::auction::{
        entities::Auction,
        service::{
            create_auction::CreateAuctionInput,
            list_auctions::ListAuctionsInput,
            place_bid::PlaceBidInput,
            start_auction::StartAuctionInput,
            AuctionError,
        },
    },
    axum::{
        extract::{
            Path,
            Query,
            State,
        },
        http::StatusCode,
        Json,
    },
    serde::{
        Deserialize,
        Serialize,
    },
    std::sync::Arc,
    time::OffsetDateTime,
    utoipa::ToSchema,
};

const MAX_PAGE_SIZE: i64 = 100;

#[derive(Deserialize, ToSchema)]
pub struct CreateAuctionBody {
    /// Explicit auction id; a random one is generated when omitted.
    #[schema(example = "auc123")]
    pub id:        Option<String>,
    #[schema(example = "seller123")]
    pub seller_id: String,
    #[schema(example = "vintage lamp")]
    pub item:      String,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, example = "2025-07-27T16:05:05Z")]
    pub ends_at:   OffsetDateTime,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct CreateAuctionResponse {
    pub id: String,
}

#[derive(Deserialize, ToSchema)]
pub struct StartAuctionBody {
    #[schema(example = "seller123")]
    pub seller_id: String,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, example = "2025-07-27T16:05:05Z")]
    pub ends_at:   OffsetDateTime,
}

#[derive(Deserialize, ToSchema)]
pub struct PlaceBidBody {
    #[schema(example = "user123")]
    pub bidder_id: String,
    #[schema(example = 5.0)]
    pub amount:    f64,
}

#[derive(Deserialize)]
pub struct ListAuctionsQuery {
    pub status: Option<String>,
    pub limit:  Option<i64>,
    pub offset: Option<i64>,
}

fn validate_paging(limit: Option<i64>, offset: Option<i64>) -> Result<(i64, i64), RestError> {
    let limit = limit.unwrap_or(10);
    if !(0..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(RestError::BadParameters(format!(
            "limit must be between 0 and {MAX_PAGE_SIZE}"
        )));
    }
    let offset = offset.unwrap_or(0);
    if offset < 0 {
        return Err(RestError::BadParameters("offset must not be negative".to_string()));
    }
    Ok((limit, offset))
}

/// Create an auction draft.
///
/// Persists a PENDING auction row; the seller (or UI) must subsequently call
/// `/auctions/{id}/start` to open bidding.
#[utoipa::path(post, path = "/auctions", request_body = CreateAuctionBody, responses(
    (status = 201, description = "Draft created", body = CreateAuctionResponse),
    (status = 400, description = "Closing time is too soon", body = ErrorBodyResponse),
    (status = 409, description = "Auction id already exists", body = ErrorBodyResponse),
),)]
pub async fn create_auction(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<CreateAuctionBody>,
) -> Result<(StatusCode, Json<CreateAuctionResponse>), RestError> {
    let id = state
        .service
        .create_auction(CreateAuctionInput {
            id:        body.id.map(|id| id.trim().to_string()),
            seller_id: body.seller_id,
            item:      body.item,
            ends_at:   body.ends_at,
        })
        .await
        .map_err(|err| match err {
            AuctionError::Closed => {
                RestError::BadParameters("ends_at must be at least 30s in the future".to_string())
            }
            other => other.into(),
        })?;
    Ok((StatusCode::CREATED, Json(CreateAuctionResponse { id })))
}

/// List auctions.
///
/// Paginated, newest closing time first, optionally filtered by status.
#[utoipa::path(get, path = "/auctions",
    params(
        ("status" = Option<String>, Query, description = "RUNNING or FINISHED; anything else means no filter"),
        ("limit" = Option<i64>, Query, description = "Max results (0-100), default 10"),
        ("offset" = Option<i64>, Query, description = "Pagination offset"),
    ),
    responses(
        (status = 200, description = "Matching auctions", body = Vec<Auction>),
        (status = 400, description = "Bad paging parameters", body = ErrorBodyResponse),
    ),
)]
pub async fn list_auctions(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<ListAuctionsQuery>,
) -> Result<Json<Vec<Auction>>, RestError> {
    let (limit, offset) = validate_paging(query.limit, query.offset)?;
    let auctions = state
        .service
        .list_auctions(ListAuctionsInput {
            status: query.status,
            limit,
            offset,
        })
        .await?;
    Ok(Json(auctions))
}

/// Get auction details.
///
/// A RUNNING auction is served from the live KV hash, anything else from the
/// relational store.
#[utoipa::path(get, path = "/auctions/{id}", params(("id" = String, Path, description = "Auction id")), responses(
    (status = 200, description = "Auction details", body = Auction),
    (status = 404, description = "No such auction", body = ErrorBodyResponse),
),)]
pub async fn get_auction(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<Auction>, RestError> {
    Ok(Json(state.service.get_auction(&id).await?))
}

/// Start an auction.
///
/// Opens the time-boxed bidding window.
#[utoipa::path(post, path = "/auctions/{id}/start", params(("id" = String, Path, description = "Auction id")), request_body = StartAuctionBody, responses(
    (status = 202, description = "Bidding is open"),
    (status = 400, description = "ends_at is not in the future", body = ErrorBodyResponse),
    (status = 409, description = "Already running or finished", body = ErrorBodyResponse),
),)]
pub async fn start_auction(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    Json(body): Json<StartAuctionBody>,
) -> Result<StatusCode, RestError> {
    if body.ends_at <= OffsetDateTime::now_utc() {
        return Err(RestError::BadParameters("ends_at must be in the future".to_string()));
    }
    state
        .service
        .start_auction(StartAuctionInput {
            id,
            seller_id: body.seller_id,
            ends_at: body.ends_at,
        })
        .await
        .map_err(|err| match err {
            AuctionError::Closed => {
                RestError::BadParameters("ends_at must be in the future".to_string())
            }
            other => other.into(),
        })?;
    Ok(StatusCode::ACCEPTED)
}

/// Stop an auction early.
///
/// Settles immediately through the usual finalization path.
#[utoipa::path(post, path = "/auctions/{id}/stop", params(("id" = String, Path, description = "Auction id")), responses(
    (status = 202, description = "Auction settled"),
    (status = 409, description = "Already finished", body = ErrorBodyResponse),
),)]
pub async fn stop_auction(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, RestError> {
    state.service.stop_auction(&id).await?;
    Ok(StatusCode::ACCEPTED)
}

/// Place a bid.
///
/// Accepted bids are arbitrated atomically in the KV store and broadcast to
/// all spectators.
#[utoipa::path(post, path = "/auctions/{id}/bid", params(("id" = String, Path, description = "Auction id")), request_body = PlaceBidBody, responses(
    (status = 202, description = "Bid accepted"),
    (status = 400, description = "Non-positive amount", body = ErrorBodyResponse),
    (status = 409, description = "Bid rejected", body = ErrorBodyResponse),
),)]
pub async fn place_bid(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    Json(body): Json<PlaceBidBody>,
) -> Result<StatusCode, RestError> {
    if body.amount <= 0.0 || !body.amount.is_finite() {
        return Err(RestError::BadParameters("amount must be positive".to_string()));
    }
    state
        .service
        .place_bid(PlaceBidInput {
            id,
            bidder_id: body.bidder_id,
            amount: body.amount,
        })
        .await?;
    Ok(StatusCode::ACCEPTED)
}

/// Delete an auction.
///
/// Permanently removes an auction and its bids; forbidden while RUNNING.
#[utoipa::path(delete, path = "/auctions/{id}", params(("id" = String, Path, description = "Auction id")), responses(
    (status = 204, description = "Auction removed"),
    (status = 404, description = "No such auction", body = ErrorBodyResponse),
    (status = 409, description = "Auction is running", body = ErrorBodyResponse),
),)]
pub async fn delete_auction(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, RestError> {
    state.service.delete_auction(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::validate_paging;

    #[test]
    fn paging_defaults() {
        assert_eq!(validate_paging(None, None).unwrap(), (10, 0));
        assert_eq!(validate_paging(Some(0), Some(5)).unwrap(), (0, 5));
        assert_eq!(validate_paging(Some(100), None).unwrap(), (100, 0));
    }

    #[test]
    fn paging_bounds() {
        assert!(validate_paging(Some(101), None).is_err());
        assert!(validate_paging(Some(-1), None).is_err());
        assert!(validate_paging(None, Some(-1)).is_err());
    }
}
