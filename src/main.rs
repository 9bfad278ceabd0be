use axum::{Router, extract::Extension, routing::get};
use changefeed_processor::cancellation::CancellationToken;
use changefeed_processor::config::ProcessorOptions;
use changefeed_processor::feed::memory::InMemoryChangeFeed;
use changefeed_processor::host::controller::PartitionController;
use changefeed_processor::host::handlers::{handle_list_leases, handle_list_partitions};
use changefeed_processor::host::protocol::{ENDPOINT_LEASES, ENDPOINT_PARTITIONS};
use changefeed_processor::lease::store::{InMemoryLeaseStore, LeaseStore};
use changefeed_processor::observer::factory::{FnObserver, FnObserverFactory};
use changefeed_processor::observer::observer::ChangeFeedObserver;
use changefeed_processor::processor::factory::PartitionSupervisorFactory;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        // .with_max_level(tracing::Level::DEBUG)
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!(
            "Usage: {} --bind <addr:port> [--partitions <n>] [--options <file.json>] [--rate <changes/s>]",
            args[0]
        );
        eprintln!("Example: {} --bind 127.0.0.1:8080", args[0]);
        eprintln!(
            "Example: {} --bind 127.0.0.1:8080 --partitions 8 --rate 20 --options processor.json",
            args[0]
        );

        std::process::exit(1);
    }

    let mut bind_addr: Option<SocketAddr> = None;
    let mut partition_count: usize = 4;
    let mut options = ProcessorOptions::default();
    let mut rate: u64 = 5;

    let mut i = 1;
    while i < args.len() {
        let value = match args.get(i + 1) {
            Some(value) => value,
            None => anyhow::bail!("missing value for {}", args[i]),
        };

        match args[i].as_str() {
            "--bind" => bind_addr = Some(value.parse()?),
            "--partitions" => partition_count = value.parse()?,
            "--options" => options = ProcessorOptions::from_json_file(value)?,
            "--rate" => rate = value.parse()?,
            other => anyhow::bail!("unknown argument {}", other),
        }
        i += 2;
    }

    let bind_addr = bind_addr.ok_or_else(|| anyhow::anyhow!("--bind is required"))?;
    options.validate()?;

    tracing::info!(
        "Starting host {} with {} partitions",
        options.host_name,
        partition_count
    );

    // 1. Feed and leases:
    let feed = Arc::new(InMemoryChangeFeed::new());
    let store = Arc::new(InMemoryLeaseStore::new(options.lease_expiration()));

    let partitions: Vec<String> = (0..partition_count).map(|p| format!("p{}", p)).collect();
    for partition in &partitions {
        feed.create_partition(partition);
        store
            .create_lease_if_not_exists(partition, options.start_continuation.clone())
            .await?;
    }

    // 2. Observer: logs every delivered batch
    let observer_factory = FnObserverFactory::new(|| {
        Arc::new(FnObserver::new(|ctx, batch| async move {
            for item in &batch.items {
                tracing::info!(
                    "[{}] lsn={} id={} payload={}",
                    ctx.lease_token(),
                    item.lsn,
                    item.id,
                    item.payload
                );
            }
            Ok(())
        })) as Arc<dyn ChangeFeedObserver>
    });

    let acquire_interval = options.lease_renew_interval();
    let factory = Arc::new(PartitionSupervisorFactory::new(
        store.clone(),
        feed.clone(),
        observer_factory,
        options,
    ));
    let controller = PartitionController::new(store.clone(), factory);

    let stop = CancellationToken::new();

    // 3. Spawn change producer:
    let producer_feed = feed.clone();
    let producer_stop = stop.clone();
    let producer_partitions = partitions.clone();
    tokio::spawn(async move {
        let period = match producer_period(rate) {
            Some(period) if !producer_partitions.is_empty() => period,
            _ => return,
        };
        let mut interval = tokio::time::interval(period);
        let mut sequence: u64 = 0;

        loop {
            tokio::select! {
                _ = producer_stop.cancelled() => break,
                _ = interval.tick() => {}
            }

            let partition = &producer_partitions[rand::random::<usize>() % producer_partitions.len()];
            sequence += 1;
            let payload = serde_json::json!({ "sequence": sequence });

            if let Err(e) = producer_feed.append(partition, &format!("doc-{}", sequence), payload) {
                tracing::debug!("Skipping write to {}: {}", partition, e);
            }
        }
    });

    // 4. Spawn lease acquisition loop:
    let acquiring = controller.clone();
    let acquire_stop = stop.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(acquire_interval);

        loop {
            tokio::select! {
                _ = acquire_stop.cancelled() => break,
                _ = interval.tick() => {}
            }

            match acquiring.acquire_available_leases().await {
                Ok(0) => {}
                Ok(started) => tracing::info!("Acquired {} leases", started),
                Err(e) => tracing::warn!("Lease acquisition failed: {}", e),
            }
        }
    });

    // 5. HTTP Router:
    let lease_store: Arc<dyn LeaseStore> = store.clone();
    let app = Router::new()
        .route(ENDPOINT_LEASES, get(handle_list_leases))
        .route(ENDPOINT_PARTITIONS, get(handle_list_partitions))
        .layer(Extension(lease_store))
        .layer(Extension(controller.clone()));

    // 6. Start HTTP server:
    tracing::info!("HTTP server listening on {}", bind_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let server_stop = stop.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_stop.cancelled().await })
            .await
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    stop.cancel();
    controller.shutdown().await;
    server.await??;

    Ok(())
}

/// Delay between two produced changes at `rate` changes per second; `None` disables the producer.
fn producer_period(rate: u64) -> Option<Duration> {
    if rate == 0 {
        return None;
    }
    // Never zero: tokio intervals reject an empty period
    Some(Duration::from_micros((1_000_000 / rate).max(1)))
}
