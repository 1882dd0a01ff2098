use {
    crate::{
        auction::{
            entities::{
                Auction,
                AuctionStatus,
            },
            service::{
                AuctionError,
                Service,
            },
        },
        config::RunOptions,
        fanout::{
            Hub,
            SubscriptionManager,
        },
        server::SHOULD_EXIT,
    },
    anyhow::Result,
    axum::{
        http::StatusCode,
        response::{
            IntoResponse,
            Response,
        },
        routing::{
            get,
            post,
        },
        Json,
        Router,
    },
    clap::crate_version,
    serde::{
        Deserialize,
        Serialize,
    },
    std::{
        net::SocketAddr,
        sync::{
            atomic::Ordering,
            Arc,
        },
    },
    tower_http::cors::CorsLayer,
    utoipa::{
        OpenApi,
        ToSchema,
    },
};

pub mod rest;
pub mod ws;

pub struct ApiState {
    pub service: Service,
    pub hub:     Arc<Hub>,
    pub fanout:  Arc<SubscriptionManager>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorBodyResponse {
    pub error: String,
}

/// Api-layer error with its HTTP status. Endpoints that deviate from the
/// default domain-error mapping (e.g. `closed` is 400 on create/start but
/// 409 on bid) pick their variant explicitly.
#[derive(Debug)]
pub enum RestError {
    /// The request contained invalid parameters or arrived too late.
    BadParameters(String),
    /// The request conflicts with the auction's current state.
    Conflict(String),
    /// The auction was not found in either store.
    NotFound(String),
    /// A catch-all for unexpected store failures.
    Internal,
}

impl From<AuctionError> for RestError {
    fn from(err: AuctionError) -> Self {
        match err {
            AuctionError::InvalidRequest(message) => RestError::BadParameters(message),
            AuctionError::NotFound => RestError::NotFound(err.to_string()),
            AuctionError::Internal(source) => {
                tracing::error!(error = ?source, "Internal error serving request.");
                RestError::Internal
            }
            conflicting => RestError::Conflict(conflicting.to_string()),
        }
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            RestError::BadParameters(message) => (StatusCode::BAD_REQUEST, message),
            RestError::Conflict(message) => (StatusCode::CONFLICT, message),
            RestError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            RestError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "an unexpected error occurred processing the request".to_string(),
            ),
        };
        (status, Json(ErrorBodyResponse { error })).into_response()
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        rest::create_auction,
        rest::list_auctions,
        rest::get_auction,
        rest::start_auction,
        rest::stop_auction,
        rest::place_bid,
        rest::delete_auction,
    ),
    components(schemas(
        Auction,
        AuctionStatus,
        ErrorBodyResponse,
        rest::CreateAuctionBody,
        rest::CreateAuctionResponse,
        rest::StartAuctionBody,
        rest::PlaceBidBody,
    )),
    tags((name = "Auctions", description = "Real-time auction backend"))
)]
struct ApiDoc;

async fn root() -> String {
    format!("bidhub {}", crate_version!())
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub async fn start_api(run_options: RunOptions, state: Arc<ApiState>) -> Result<()> {
    let app: Router<()> = Router::new()
        .route("/", get(root))
        .route("/docs/openapi.json", get(openapi_json))
        .route("/auctions", post(rest::create_auction).get(rest::list_auctions))
        .route(
            "/auctions/:id",
            get(rest::get_auction).delete(rest::delete_auction),
        )
        .route("/auctions/:id/start", post(rest::start_auction))
        .route("/auctions/:id/stop", post(rest::stop_auction))
        .route("/auctions/:id/bid", post(rest::place_bid))
        .route("/ws", get(ws::ws_route_handler))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], run_options.server.http_server_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("API server listening on {}.", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            while !SHOULD_EXIT.load(Ordering::Acquire) {
                tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
            }
            tracing::info!("Shutting down API server...");
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use {
        super::RestError,
        crate::auction::service::AuctionError,
        axum::{
            http::StatusCode,
            response::IntoResponse,
        },
    };

    #[test]
    fn default_error_mapping() {
        for (err, status) in [
            (AuctionError::Closed, StatusCode::CONFLICT),
            (AuctionError::Exists, StatusCode::CONFLICT),
            (AuctionError::AlreadyRunning, StatusCode::CONFLICT),
            (AuctionError::AlreadyFinished, StatusCode::CONFLICT),
            (AuctionError::Running, StatusCode::CONFLICT),
            (AuctionError::BidEqual, StatusCode::CONFLICT),
            (AuctionError::BidBelowCurrent, StatusCode::CONFLICT),
            (AuctionError::BidBelowIncrement, StatusCode::CONFLICT),
            (AuctionError::NotFound, StatusCode::NOT_FOUND),
            (
                AuctionError::InvalidRequest("bad".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                AuctionError::Internal(anyhow::anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ] {
            let response = RestError::from(err).into_response();
            assert_eq!(response.status(), status);
        }
    }
}
