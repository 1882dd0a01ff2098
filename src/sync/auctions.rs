use {
    crate::{
        auction::{
            entities::LiveAuction,
            repository::Repository,
        },
        kernel::kv,
        server::{
            EXIT_CHECK_INTERVAL,
            SHOULD_EXIT,
        },
    },
    anyhow::Result,
    redis::{
        aio::ConnectionManager,
        AsyncCommands,
    },
    std::{
        collections::HashMap,
        sync::atomic::Ordering,
        time::Duration,
    },
};

const SYNC_INTERVAL: Duration = Duration::from_secs(10);

/// Mirrors every active auction's high bid into the relational store each
/// tick. This is a read-KV, write-relational mirror for queries and disaster
/// recovery; it never transitions status — the finalizer owns that.
pub async fn run_snapshot_reconciler(
    mut conn: ConnectionManager,
    repo: Repository,
) -> Result<()> {
    let mut tick = tokio::time::interval(SYNC_INTERVAL);
    let mut exit_check_interval = tokio::time::interval(EXIT_CHECK_INTERVAL);

    while !SHOULD_EXIT.load(Ordering::Acquire) {
        tokio::select! {
            _ = tick.tick() => {
                if let Err(err) = sync_once(&mut conn, &repo).await {
                    tracing::error!(error = ?err, "Snapshot reconciler tick failed.");
                }
            }
            _ = exit_check_interval.tick() => {}
        }
    }
    Ok(())
}

async fn sync_once(conn: &mut ConnectionManager, repo: &Repository) -> Result<()> {
    let keys: Vec<String> = conn.smembers(kv::ACTIVE_SET).await?;
    if keys.is_empty() {
        return Ok(());
    }

    let mut pipe = redis::pipe();
    for key in &keys {
        pipe.hgetall(key);
    }
    let hashes: Vec<HashMap<String, String>> = pipe.query_async(conn).await?;

    // A key may have expired between the set read and the hash read; empty
    // hashes are simply skipped until the set membership catches up.
    let snapshots: Vec<(String, LiveAuction)> = keys
        .iter()
        .zip(hashes.iter())
        .filter(|(_, hash)| !hash.is_empty())
        .filter_map(|(key, hash)| {
            key.strip_prefix(kv::AUCTION_KEY_PREFIX)
                .map(|id| (id.to_string(), LiveAuction::from_hash(hash)))
        })
        .collect();
    if snapshots.is_empty() {
        return Ok(());
    }

    repo.sync_running(&snapshots).await?;
    tracing::debug!(count = snapshots.len(), "Mirrored running auctions.");
    Ok(())
}
