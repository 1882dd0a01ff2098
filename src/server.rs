use {
    crate::{
        api::{
            self,
            ApiState,
        },
        auction::{
            repository::Repository,
            service::Service,
        },
        config::RunOptions,
        fanout::{
            Hub,
            SubscriptionManager,
        },
        kernel::{
            db,
            kv,
        },
        sync,
        watcher,
    },
    anyhow::anyhow,
    futures::Future,
    sqlx::migrate,
    std::{
        sync::{
            atomic::{
                AtomicBool,
                Ordering,
            },
            Arc,
        },
        time::Duration,
    },
    tokio::time::sleep,
    tokio_util::task::TaskTracker,
};

// A static exit flag to indicate to running threads that we're shutting down. This is used to
// gracefully shutdown the application.
//
// NOTE: A more idiomatic approach would be to use a tokio::sync::broadcast channel, and to send a
// shutdown signal to all running tasks. However, this is a bit more complicated to implement and
// we don't rely on global state for anything else.
pub(crate) static SHOULD_EXIT: AtomicBool = AtomicBool::new(false);
pub const EXIT_CHECK_INTERVAL: Duration = Duration::from_secs(1);

async fn fault_tolerant_handler<F, Fut>(name: String, f: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    Fut::Output: Send + 'static,
{
    loop {
        let res = tokio::spawn(f()).await;
        match res {
            Ok(result) => match result {
                Ok(_) => break, // This will happen on graceful shutdown
                Err(err) => {
                    tracing::error!("{} returned error: {:?}", name, err);
                    sleep(Duration::from_millis(500)).await;
                }
            },
            Err(err) => {
                tracing::error!("{} is panicked or canceled: {:?}", name, err);
                SHOULD_EXIT.store(true, Ordering::Release);
                break;
            }
        }
    }
}

pub async fn start_server(run_options: RunOptions) -> anyhow::Result<()> {
    tokio::spawn(async move {
        tracing::info!("Registered shutdown signal handler...");
        tokio::signal::ctrl_c().await.unwrap();
        tracing::info!("Shut down signal received, waiting for tasks...");
        SHOULD_EXIT.store(true, Ordering::Release);
    });

    let database_url = db::postgres_url(
        &run_options.database.host,
        run_options.database.port,
        &run_options.database.user,
        &run_options.database.password,
        &run_options.database.database,
    );
    let pool = db::new_pool(&database_url)
        .await
        .expect("Server should start with a valid database connection.");
    match migrate!("./migrations").run(&pool).await {
        Ok(()) => {}
        Err(err) => match err {
            sqlx::migrate::MigrateError::VersionMissing(version) => {
                tracing::info!(
                    "Found missing migration ({}) probably because of downgrade",
                    version
                );
            }
            _ => {
                return Err(anyhow!("Failed to run migrations: {:?}", err));
            }
        },
    }

    let (kv_client, mut kv_conn) = kv::connect(&run_options.kv.host, run_options.kv.port).await?;
    kv::load_functions(&mut kv_conn).await?;

    let task_tracker = TaskTracker::new();
    let service = Service::new(
        kv_conn.clone(),
        pool.clone(),
        run_options.server.bid_min_increment,
    );
    let repo = Repository::new(pool);
    let hub = Arc::new(Hub::new());
    let fanout = Arc::new(SubscriptionManager::new(
        kv_client.clone(),
        hub.clone(),
        task_tracker.clone(),
    ));
    let api_state = Arc::new(ApiState {
        service: service.clone(),
        hub,
        fanout,
    });

    tokio::join!(
        fault_tolerant_handler("expiry watcher".to_string(), || {
            watcher::run_expiry_watcher(kv_client.clone(), kv_conn.clone(), service.clone())
        }),
        fault_tolerant_handler("snapshot reconciler".to_string(), || {
            sync::auctions::run_snapshot_reconciler(kv_conn.clone(), repo.clone())
        }),
        fault_tolerant_handler("bid stream tailer".to_string(), || {
            sync::bids::run_bid_stream_tailer(kv_conn.clone(), repo.clone())
        }),
        fault_tolerant_handler("api server".to_string(), || api::start_api(
            run_options.clone(),
            api_state.clone()
        )),
    );

    // To make sure all the spawned tasks will finish their job before shut down
    // Closing task tracker doesn't mean that it won't accept new tasks!!
    task_tracker.close();
    task_tracker.wait().await;

    Ok(())
}
