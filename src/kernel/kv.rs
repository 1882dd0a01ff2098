use {
    anyhow::{
        anyhow,
        Context,
    },
    redis::{
        aio::ConnectionManager,
        Client,
    },
    std::time::Duration,
};

pub const AUCTION_KEY_PREFIX: &str = "auc:";
pub const TIMER_KEY_PREFIX: &str = "auc_t:";
pub const LOCK_KEY_PREFIX: &str = "auc_lock:";
pub const ACTIVE_SET: &str = "aucs:active";
pub const ENDED_SET: &str = "aucs:ended";
pub const BID_STREAM: &str = "bids_stream";
pub const EXPIRED_EVENTS_PATTERN: &str = "__keyevent@*__:expired";

const FUNCTION_LIBRARY: &str = include_str!("scripts/bidhub.lua");
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub fn auction_key(id: &str) -> String {
    format!("{AUCTION_KEY_PREFIX}{id}")
}

pub fn timer_key(id: &str) -> String {
    format!("{TIMER_KEY_PREFIX}{id}")
}

pub fn lock_key(id: &str) -> String {
    format!("{LOCK_KEY_PREFIX}{id}")
}

pub fn events_channel(id: &str) -> String {
    format!("{AUCTION_KEY_PREFIX}{id}:events")
}

/// Builds an `FCALL <function> 2 auc:<id> auc_t:<id>` command; callers append
/// the function arguments.
pub fn fcall(function: &str, auction_id: &str) -> redis::Cmd {
    let mut cmd = redis::cmd("FCALL");
    cmd.arg(function)
        .arg(2)
        .arg(auction_key(auction_id))
        .arg(timer_key(auction_id));
    cmd
}

/// Connects to the KV store and verifies liveness with a PING. The returned
/// `Client` is kept for opening dedicated pub/sub connections; the
/// `ConnectionManager` is the shared multiplexed connection for everything
/// else.
pub async fn connect(host: &str, port: u16) -> anyhow::Result<(Client, ConnectionManager)> {
    let client = Client::open(format!("redis://{host}:{port}"))
        .with_context(|| format!("invalid redis address {host}:{port}"))?;
    let manager = ConnectionManager::new(client.clone())
        .await
        .with_context(|| format!("failed to connect to redis at {host}:{port}"))?;

    let mut conn = manager.clone();
    tokio::time::timeout(CONNECT_TIMEOUT, redis::cmd("PING").query_async::<_, String>(&mut conn))
        .await
        .map_err(|_| anyhow!("redis ping timed out after {:?}", CONNECT_TIMEOUT))?
        .context("redis ping failed")?;

    Ok((client, manager))
}

/// Loads (and replaces) the embedded atomic function library. Must run at
/// boot before any auction is started.
pub async fn load_functions(conn: &mut ConnectionManager) -> anyhow::Result<()> {
    redis::cmd("FUNCTION")
        .arg("LOAD")
        .arg("REPLACE")
        .arg(FUNCTION_LIBRARY)
        .query_async::<_, String>(conn)
        .await
        .context("failed to load the auction function library")?;
    tracing::info!("Loaded auction function library into the KV store.");
    Ok(())
}

/// The expiry watcher needs key-expired notifications enabled. Best-effort:
/// a managed store may refuse CONFIG, in which case the operator has to set
/// `notify-keyspace-events=Ex` out of band.
pub async fn enable_expiry_notifications(conn: &mut ConnectionManager) {
    if let Err(err) = redis::cmd("CONFIG")
        .arg("SET")
        .arg("notify-keyspace-events")
        .arg("Ex")
        .query_async::<_, ()>(conn)
        .await
    {
        tracing::warn!(error = ?err, "Could not enable keyspace expiry notifications.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_helpers() {
        assert_eq!(auction_key("a1"), "auc:a1");
        assert_eq!(timer_key("a1"), "auc_t:a1");
        assert_eq!(lock_key("a1"), "auc_lock:a1");
        assert_eq!(events_channel("a1"), "auc:a1:events");
    }

    #[test]
    fn library_registers_all_entrypoints() {
        for f in ["auction_start", "auction_place_bid", "auction_stop"] {
            assert!(FUNCTION_LIBRARY.contains(&format!("redis.register_function('{f}'")));
        }
    }
}
