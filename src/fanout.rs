use {
    crate::kernel::kv,
    dashmap::DashMap,
    futures::StreamExt,
    redis::Client,
    serde_json::{
        json,
        Value,
    },
    std::{
        collections::HashMap,
        sync::{
            Arc,
            Mutex,
        },
    },
    tokio::sync::mpsc,
    tokio_util::{
        sync::CancellationToken,
        task::TaskTracker,
    },
};

pub type SessionId = usize;

/// Outbound half of a websocket session actor. The actor owns the socket
/// sink, so pushing through this channel serializes all writes per socket.
pub type SessionSender = mpsc::Sender<String>;

#[derive(Default)]
struct Room {
    sessions: std::sync::RwLock<HashMap<SessionId, SessionSender>>,
}

impl Room {
    fn snapshot(&self) -> Vec<(SessionId, SessionSender)> {
        self.sessions
            .read()
            .expect("room lock poisoned")
            .iter()
            .map(|(id, sender)| (*id, sender.clone()))
            .collect()
    }
}

/// In-process per-auction broadcast sets. Rooms are created lazily on the
/// first join and stay registered for the process lifetime, mirroring how
/// auction ids are reused across restarts of the same auction.
#[derive(Default)]
pub struct Hub {
    rooms: DashMap<String, Room>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, auction_id: &str, session_id: SessionId, sender: SessionSender) {
        self.rooms
            .entry(auction_id.to_owned())
            .or_default()
            .sessions
            .write()
            .expect("room lock poisoned")
            .insert(session_id, sender);
    }

    pub fn leave(&self, auction_id: &str, session_id: SessionId) {
        if let Some(room) = self.rooms.get(auction_id) {
            room.sessions
                .write()
                .expect("room lock poisoned")
                .remove(&session_id);
        }
    }

    /// Best-effort delivery to every session in the room. The member set is
    /// snapshotted under the read lock and the sends happen outside it; a
    /// session whose channel is gone is pruned.
    pub async fn broadcast(&self, auction_id: &str, message: &str) {
        let targets = match self.rooms.get(auction_id) {
            Some(room) => room.snapshot(),
            None => return,
        };

        let mut closed = Vec::new();
        for (session_id, sender) in targets {
            if sender.send(message.to_owned()).await.is_err() {
                closed.push(session_id);
            }
        }
        if !closed.is_empty() {
            if let Some(room) = self.rooms.get(auction_id) {
                let mut sessions = room.sessions.write().expect("room lock poisoned");
                for session_id in closed {
                    sessions.remove(&session_id);
                }
            }
        }
    }

    pub fn room_size(&self, auction_id: &str) -> usize {
        self.rooms
            .get(auction_id)
            .map(|room| room.sessions.read().expect("room lock poisoned").len())
            .unwrap_or(0)
    }
}

struct SubEntry {
    ref_count: usize,
    cancel:    CancellationToken,
}

/// Guarantees exactly one store subscription per `auc:<id>:events` channel no
/// matter how many websocket clients join the same room. Counter increments
/// and decrements are paired by the session lifecycle; the fan-out task never
/// holds the counter lock.
pub struct SubscriptionManager {
    client:       Client,
    hub:          Arc<Hub>,
    task_tracker: TaskTracker,
    subs:         Mutex<HashMap<String, SubEntry>>,
}

impl SubscriptionManager {
    pub fn new(client: Client, hub: Arc<Hub>, task_tracker: TaskTracker) -> Self {
        Self {
            client,
            hub,
            task_tracker,
            subs: Mutex::new(HashMap::new()),
        }
    }

    /// First subscriber spawns the fan-out task; later ones only bump the
    /// counter.
    pub fn subscribe(&self, auction_id: &str) {
        let token = {
            let mut subs = self.subs.lock().expect("subscription lock poisoned");
            if let Some(entry) = subs.get_mut(auction_id) {
                entry.ref_count += 1;
                return;
            }
            let token = CancellationToken::new();
            subs.insert(auction_id.to_owned(), SubEntry {
                ref_count: 1,
                cancel:    token.clone(),
            });
            token
        };
        self.task_tracker.spawn(run_fanout(
            self.client.clone(),
            self.hub.clone(),
            auction_id.to_owned(),
            token,
        ));
    }

    /// Last unsubscriber tears the store subscription down, outside the lock.
    pub fn unsubscribe(&self, auction_id: &str) {
        let removed = {
            let mut subs = self.subs.lock().expect("subscription lock poisoned");
            let Some(entry) = subs.get_mut(auction_id) else {
                return;
            };
            entry.ref_count -= 1;
            if entry.ref_count > 0 {
                return;
            }
            subs.remove(auction_id)
        };
        if let Some(entry) = removed {
            entry.cancel.cancel();
        }
    }

    #[cfg(test)]
    fn active_subscriptions(&self) -> usize {
        self.subs.lock().expect("subscription lock poisoned").len()
    }

    #[cfg(test)]
    fn ref_count(&self, auction_id: &str) -> usize {
        self.subs
            .lock()
            .expect("subscription lock poisoned")
            .get(auction_id)
            .map(|entry| entry.ref_count)
            .unwrap_or(0)
    }
}

async fn run_fanout(client: Client, hub: Arc<Hub>, auction_id: String, cancel: CancellationToken) {
    let channel = kv::events_channel(&auction_id);
    let mut pubsub = tokio::select! {
        _ = cancel.cancelled() => return,
        result = client.get_async_pubsub() => match result {
            Ok(pubsub) => pubsub,
            Err(err) => {
                tracing::error!(error = ?err, channel, "Failed to open fan-out subscription.");
                return;
            }
        },
    };
    if let Err(err) = pubsub.subscribe(&channel).await {
        tracing::error!(error = ?err, channel, "Failed to subscribe to events channel.");
        return;
    }

    let mut stream = pubsub.on_message();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            message = stream.next() => {
                let Some(message) = message else {
                    tracing::warn!(channel, "Fan-out pub/sub stream closed.");
                    return;
                };
                let payload: String = message.get_payload().unwrap_or_default();
                // forward as-is when the payload is not the JSON we expect
                let wrapped = wrap_event(&payload).unwrap_or(payload);
                hub.broadcast(&auction_id, &wrapped).await;
            }
        }
    }
}

/// Wraps a raw store event `{"event":"bid",...}` into the websocket envelope
/// `{"event":"auctions/bid","body":{...}}` so server- and client-initiated
/// messages share one contract.
pub fn wrap_event(payload: &str) -> Option<String> {
    let Value::Object(mut raw) = serde_json::from_str(payload).ok()? else {
        return None;
    };
    let event = match raw.remove("event") {
        Some(Value::String(event)) if !event.is_empty() => event,
        _ => "unknown".to_string(),
    };
    serde_json::to_string(&json!({
        "event": format!("auctions/{event}"),
        "body": Value::Object(raw),
    }))
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hub_broadcasts_to_all_sessions_and_prunes_closed() {
        let hub = Hub::new();
        let (sender_a, mut receiver_a) = mpsc::channel(8);
        let (sender_b, mut receiver_b) = mpsc::channel(8);
        hub.join("a1", 1, sender_a);
        hub.join("a1", 2, sender_b);
        assert_eq!(hub.room_size("a1"), 2);

        hub.broadcast("a1", "first").await;
        assert_eq!(receiver_a.recv().await.unwrap(), "first");
        assert_eq!(receiver_b.recv().await.unwrap(), "first");

        // a dead session is removed on the next broadcast
        drop(receiver_b);
        hub.broadcast("a1", "second").await;
        assert_eq!(receiver_a.recv().await.unwrap(), "second");
        assert_eq!(hub.room_size("a1"), 1);

        hub.leave("a1", 1);
        assert_eq!(hub.room_size("a1"), 0);
    }

    #[tokio::test]
    async fn hub_broadcast_to_unknown_room_is_noop() {
        Hub::new().broadcast("missing", "ignored").await;
    }

    #[tokio::test]
    async fn refcounts_pair_exactly() {
        let manager = SubscriptionManager::new(
            Client::open("redis://127.0.0.1:1").unwrap(),
            Arc::new(Hub::new()),
            TaskTracker::new(),
        );

        manager.subscribe("a1");
        manager.subscribe("a1");
        assert_eq!(manager.active_subscriptions(), 1);
        assert_eq!(manager.ref_count("a1"), 2);

        manager.unsubscribe("a1");
        assert_eq!(manager.active_subscriptions(), 1);
        assert_eq!(manager.ref_count("a1"), 1);

        manager.unsubscribe("a1");
        assert_eq!(manager.active_subscriptions(), 0);

        // a stray extra unsubscribe must not underflow or re-create state
        manager.unsubscribe("a1");
        assert_eq!(manager.active_subscriptions(), 0);
    }

    #[test]
    fn wraps_store_event_into_envelope() {
        let wrapped = wrap_event(r#"{"event":"bid","bidder":"u1","amount":5,"at":1}"#).unwrap();
        let value: Value = serde_json::from_str(&wrapped).unwrap();
        assert_eq!(value["event"], "auctions/bid");
        assert_eq!(value["body"]["bidder"], "u1");
        assert_eq!(value["body"]["amount"], 5);
        assert!(value["body"].get("event").is_none());
    }

    #[test]
    fn missing_event_becomes_unknown() {
        let wrapped = wrap_event(r#"{"hb":7}"#).unwrap();
        let value: Value = serde_json::from_str(&wrapped).unwrap();
        assert_eq!(value["event"], "auctions/unknown");
        assert_eq!(value["body"]["hb"], 7);
    }

    #[test]
    fn malformed_payload_is_not_wrapped() {
        assert!(wrap_event("not json").is_none());
        assert!(wrap_event(r#"["array"]"#).is_none());
    }
}
