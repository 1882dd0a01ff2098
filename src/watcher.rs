use {
    crate::{
        auction::service::Service,
        kernel::kv,
        server::{
            EXIT_CHECK_INTERVAL,
            SHOULD_EXIT,
        },
    },
    anyhow::Result,
    futures::StreamExt,
    redis::{
        aio::ConnectionManager,
        Client,
    },
    std::sync::atomic::Ordering,
};

/// Listens to key-expiry notifications and finalizes auctions whose timer key
/// lapsed. Errors from finalize are logged, not retried here: the snapshot
/// reconciler and explicit Stop are the recovery path.
pub async fn run_expiry_watcher(
    client: Client,
    mut conn: ConnectionManager,
    service: Service,
) -> Result<()> {
    kv::enable_expiry_notifications(&mut conn).await;

    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.psubscribe(kv::EXPIRED_EVENTS_PATTERN).await?;
    tracing::info!("Expiry watcher subscribed to {}.", kv::EXPIRED_EVENTS_PATTERN);

    let mut exit_check_interval = tokio::time::interval(EXIT_CHECK_INTERVAL);
    let mut stream = pubsub.on_message();

    while !SHOULD_EXIT.load(Ordering::Acquire) {
        tokio::select! {
            message = stream.next() => {
                let Some(message) = message else {
                    anyhow::bail!("expiry pub/sub stream closed");
                };
                let payload: String = message.get_payload().unwrap_or_default();
                let Some(id) = payload.strip_prefix(kv::TIMER_KEY_PREFIX) else {
                    continue;
                };
                if let Err(err) = service.finalize(id).await {
                    tracing::error!(error = ?err, auction_id = id, "Finalize after expiry failed.");
                }
            }
            _ = exit_check_interval.tick() => {}
        }
    }
    Ok(())
}
