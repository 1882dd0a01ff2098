use {
    super::{
        ApiState,
        ErrorBodyResponse,
    },
    crate::{
        auction::{
            entities::Auction,
            service::{
                place_bid::PlaceBidInput,
                AuctionError,
                Service,
            },
        },
        server::{
            EXIT_CHECK_INTERVAL,
            SHOULD_EXIT,
        },
    },
    anyhow::{
        anyhow,
        Result,
    },
    axum::{
        extract::{
            ws::{
                Message,
                WebSocket,
            },
            Query,
            State,
            WebSocketUpgrade,
        },
        http::StatusCode,
        response::{
            IntoResponse,
            Response,
        },
        Json,
    },
    futures::{
        stream::{
            SplitSink,
            SplitStream,
        },
        SinkExt,
        StreamExt,
    },
    serde::Deserialize,
    serde_json::{
        json,
        Value,
    },
    std::{
        collections::HashMap,
        future::Future,
        pin::Pin,
        sync::{
            atomic::{
                AtomicUsize,
                Ordering,
            },
            Arc,
        },
        time::{
            Duration,
            Instant,
        },
    },
    tokio::sync::mpsc,
};

/// Client frames are tiny bid/control envelopes; anything bigger is abuse.
const MAX_FRAME_BYTES: usize = 512;
const PING_INTERVAL: Duration = Duration::from_secs(3);
const WRITE_DEADLINE: Duration = Duration::from_secs(10);
const READ_DEADLINE: Duration = Duration::from_secs(12);
const DISPATCH_DEADLINE: Duration = Duration::from_millis(1900);
const SNAPSHOT_DEADLINE: Duration = Duration::from_secs(4);
const OUTBOUND_CHAN_LEN: usize = 64;

static SESSION_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Every websocket frame, in both directions, is `{event, body}`.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub body:  Value,
}

#[derive(Debug, Deserialize)]
struct BidRequest {
    amount: f64,
}

#[derive(Deserialize)]
pub struct WsParams {
    auction_id: Option<String>,
    user_id:    Option<String>,
}

pub async fn ws_route_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<Arc<ApiState>>,
) -> Response {
    let (auction_id, user_id) = match (
        params.auction_id.filter(|id| !id.is_empty()),
        params.user_id.filter(|id| !id.is_empty()),
    ) {
        (Some(auction_id), Some(user_id)) => (auction_id, user_id),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorBodyResponse {
                    error: "auction_id and user_id are required".to_string(),
                }),
            )
                .into_response();
        }
    };

    ws.max_message_size(MAX_FRAME_BYTES)
        .max_frame_size(MAX_FRAME_BYTES)
        .on_upgrade(move |socket| websocket_handler(socket, state, auction_id, user_id))
}

async fn websocket_handler(
    socket: WebSocket,
    state: Arc<ApiState>,
    auction_id: String,
    user_id: String,
) {
    let session_id = SESSION_COUNTER.fetch_add(1, Ordering::SeqCst);
    let (sender, receiver) = socket.split();
    let (outbound_sender, outbound_receiver) = mpsc::channel(OUTBOUND_CHAN_LEN);

    state.hub.join(&auction_id, session_id, outbound_sender);
    state.fanout.subscribe(&auction_id);

    let mut session = Session {
        id: session_id,
        auction_id: auction_id.clone(),
        user_id,
        state: state.clone(),
        router: default_router(),
        sender,
        receiver,
        outbound: outbound_receiver,
        ping_interval: tokio::time::interval(PING_INTERVAL),
        exit_check_interval: tokio::time::interval(EXIT_CHECK_INTERVAL),
        last_heard: Instant::now(),
        closed: false,
    };
    session.run().await;

    state.hub.leave(&auction_id, session_id);
    state.fanout.unsubscribe(&auction_id);
    tracing::debug!(
        session = session_id,
        auction_id,
        remaining = state.hub.room_size(&auction_id),
        "Websocket session closed."
    );
}

/// One actor per connection: owns the socket, so every write (broadcast,
/// ack, ping, snapshot) is serialized without a per-socket lock.
struct Session {
    id:                  usize,
    auction_id:          String,
    user_id:             String,
    state:               Arc<ApiState>,
    router:              WsRouter<SessionContext>,
    sender:              SplitSink<WebSocket, Message>,
    receiver:            SplitStream<WebSocket>,
    outbound:            mpsc::Receiver<String>,
    ping_interval:       tokio::time::Interval,
    exit_check_interval: tokio::time::Interval,
    last_heard:          Instant,
    closed:              bool,
}

impl Session {
    async fn run(&mut self) {
        if let Err(err) = tokio::time::timeout(SNAPSHOT_DEADLINE, self.push_initial_snapshot())
            .await
            .unwrap_or_else(|_| Err(AuctionError::Internal(anyhow!("snapshot timed out"))))
        {
            if !matches!(err, AuctionError::NotFound) {
                tracing::warn!(session = self.id, error = ?err, "Initial snapshot failed.");
            }
        }

        while !self.closed {
            if let Err(err) = self.handle_next().await {
                tracing::debug!(session = self.id, error = ?err, "Closing websocket session.");
                break;
            }
        }
        let _ = self.sender.close().await;
    }

    async fn handle_next(&mut self) -> Result<()> {
        tokio::select! {
            broadcast = self.outbound.recv() => {
                match broadcast {
                    Some(message) => self.write(Message::Text(message)).await,
                    None => Err(anyhow!("removed from room")),
                }
            }
            frame = self.receiver.next() => {
                self.handle_client_frame(frame.ok_or(anyhow!("client stream closed"))??)
                    .await
            }
            _ = self.ping_interval.tick() => {
                if self.last_heard.elapsed() > READ_DEADLINE {
                    return Err(anyhow!("read deadline exceeded"));
                }
                self.write(Message::Ping(Vec::new())).await
            }
            _ = self.exit_check_interval.tick() => {
                if SHOULD_EXIT.load(Ordering::Acquire) {
                    self.closed = true;
                    return Err(anyhow!("application is shutting down"));
                }
                Ok(())
            }
        }
    }

    async fn handle_client_frame(&mut self, message: Message) -> Result<()> {
        self.last_heard = Instant::now();
        let envelope = match message {
            Message::Close(_) => {
                self.closed = true;
                return Ok(());
            }
            Message::Text(text) => serde_json::from_str::<Envelope>(&text),
            Message::Binary(data) => serde_json::from_slice::<Envelope>(&data),
            // the ws layer answers pings on its own; inbound traffic of any
            // kind only feeds the read deadline
            Message::Ping(_) | Message::Pong(_) => return Ok(()),
        };
        let envelope = match envelope {
            Ok(envelope) => envelope,
            Err(err) => return self.write_error(err.to_string()).await,
        };

        let context = SessionContext {
            auction_id: self.auction_id.clone(),
            user_id:    self.user_id.clone(),
            service:    self.state.service.clone(),
        };
        let result = tokio::time::timeout(
            DISPATCH_DEADLINE,
            self.router.dispatch(context, &envelope.event, envelope.body),
        )
        .await
        .unwrap_or_else(|_| Err(AuctionError::Internal(anyhow!("handler timed out"))));

        // handler outcomes never terminate the session; only transport
        // errors do
        match result {
            Ok(body) => {
                self.write_json(&json!({
                    "event": format!("{}-ack", envelope.event),
                    "body": body,
                }))
                .await
            }
            Err(err) => {
                tracing::debug!(
                    session = self.id,
                    event = envelope.event,
                    kind = err.kind(),
                    "Websocket handler rejected request."
                );
                self.write_error(err.to_string()).await
            }
        }
    }

    async fn push_initial_snapshot(&mut self) -> Result<(), AuctionError> {
        let hash = self
            .state
            .service
            .live_snapshot(&self.auction_id)
            .await
            .unwrap_or_default();
        let body = if hash.is_empty() {
            let auction = self.state.service.get_auction(&self.auction_id).await?;
            db_snapshot_body(&auction)
        } else {
            // live hash fields go out verbatim
            serde_json::to_value(&hash).unwrap_or_default()
        };
        self.write_json(&json!({ "event": "auctions/snapshot", "body": body }))
            .await
            .map_err(AuctionError::Internal)
    }

    async fn write_json(&mut self, value: &Value) -> Result<()> {
        self.write(Message::Text(value.to_string())).await
    }

    async fn write_error(&mut self, error: String) -> Result<()> {
        self.write_json(&json!({ "event": "error", "body": { "error": error } }))
            .await
    }

    async fn write(&mut self, message: Message) -> Result<()> {
        tokio::time::timeout(WRITE_DEADLINE, self.sender.send(message))
            .await
            .map_err(|_| anyhow!("write deadline exceeded"))??;
        Ok(())
    }
}

/// Hash-shaped snapshot for auctions that are not live in the KV store.
fn db_snapshot_body(auction: &Auction) -> Value {
    json!({
        "sid":  auction.seller_id,
        "sa":   auction.starts_at.unix_timestamp(),
        "ea":   auction.ends_at.unix_timestamp(),
        "st":   auction.status.as_str(),
        "hb":   format_amount(auction.high_bid),
        "hbid": auction.high_bidder,
    })
}

fn format_amount(amount: f64) -> String {
    format!("{amount}")
}

#[derive(Clone)]
pub struct SessionContext {
    pub auction_id: String,
    pub user_id:    String,
    pub service:    Service,
}

type HandlerResult = Result<Value, AuctionError>;
type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;
type Handler<C> = Box<dyn Fn(C, Value) -> HandlerFuture + Send + Sync>;

/// Event-keyed dispatch for client-initiated frames.
pub struct WsRouter<C> {
    handlers: HashMap<&'static str, Handler<C>>,
}

impl<C> WsRouter<C> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register<F, Fut>(&mut self, event: &'static str, handler: F)
    where
        F: Fn(C, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handlers
            .insert(event, Box::new(move |context, body| Box::pin(handler(context, body))));
    }

    pub async fn dispatch(&self, context: C, event: &str, body: Value) -> HandlerResult {
        let Some(handler) = self.handlers.get(event) else {
            return Err(AuctionError::InvalidRequest("unknown_event".to_string()));
        };
        handler(context, body).await
    }
}

/// Local validation of an `auctions/bid` body; store-side arbitration only
/// runs for amounts that pass this.
fn parse_bid_amount(body: Value) -> Result<f64, AuctionError> {
    let request: BidRequest =
        serde_json::from_value(body).map_err(|err| AuctionError::InvalidRequest(err.to_string()))?;
    if request.amount <= 0.0 || !request.amount.is_finite() {
        return Err(AuctionError::InvalidRequest("invalid_amount".to_string()));
    }
    Ok(request.amount)
}

fn default_router() -> WsRouter<SessionContext> {
    let mut router = WsRouter::new();
    router.register("auctions/bid", |context: SessionContext, body| async move {
        let amount = parse_bid_amount(body)?;
        context
            .service
            .place_bid(PlaceBidInput {
                id: context.auction_id,
                bidder_id: context.user_id,
                amount,
            })
            .await?;
        Ok(json!({}))
    });
    router
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::auction::entities::LiveAuction,
    };

    #[test]
    fn envelope_body_defaults_to_null() {
        let envelope: Envelope = serde_json::from_str(r#"{"event":"auctions/bid"}"#).unwrap();
        assert_eq!(envelope.event, "auctions/bid");
        assert!(envelope.body.is_null());
    }

    #[test]
    fn amounts_format_like_hash_fields() {
        assert_eq!(format_amount(6.0), "6");
        assert_eq!(format_amount(5.5), "5.5");
        assert_eq!(format_amount(0.0), "0");
    }

    #[test]
    fn db_snapshot_is_hash_shaped() {
        let auction = LiveAuction {
            seller_id:   "s1".to_string(),
            starts_at:   100,
            ends_at:     160,
            status:      "FINISHED".to_string(),
            high_bid:    6.0,
            high_bidder: "u2".to_string(),
        }
        .into_auction("a1".to_string());
        let body = db_snapshot_body(&auction);
        assert_eq!(body["sid"], "s1");
        assert_eq!(body["sa"], 100);
        assert_eq!(body["ea"], 160);
        assert_eq!(body["st"], "FINISHED");
        assert_eq!(body["hb"], "6");
        assert_eq!(body["hbid"], "u2");
    }

    #[tokio::test]
    async fn router_dispatches_registered_events() {
        let mut router = WsRouter::<()>::new();
        router.register("echo", |_context, body| async move { Ok(body) });

        let result = router.dispatch((), "echo", json!({"x": 1})).await.unwrap();
        assert_eq!(result, json!({"x": 1}));
    }

    #[tokio::test]
    async fn unknown_event_is_rejected() {
        let router = WsRouter::<()>::new();
        let err = router
            .dispatch((), "auctions/nope", Value::Null)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
        assert_eq!(err.to_string(), "unknown_event");
    }

    #[test]
    fn bid_amounts_must_be_positive() {
        assert_eq!(parse_bid_amount(json!({"amount": 5.5})).unwrap(), 5.5);
        for body in [json!({"amount": 0}), json!({"amount": -3.5})] {
            let err = parse_bid_amount(body).unwrap_err();
            assert_eq!(err.to_string(), "invalid_amount");
        }
    }

    #[test]
    fn malformed_bid_bodies_are_invalid_requests() {
        let err = parse_bid_amount(json!({"amount": "five"})).unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
        let err = parse_bid_amount(Value::Null).unwrap_err();
        assert_eq!(err.kind(), "invalid_request");
    }
}
