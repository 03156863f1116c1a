//! maildedup: near-duplicate email thread deduplication and reply-hierarchy
//! reconstruction.
//!
//! Wires the thread store, dedup engine, ingest worker, and query API
//! together and runs them concurrently until shutdown.

mod config;

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};

use config::AppConfig;
use engine::{DedupEngine, DefaultDedupEngine, DistanceOracle};
use ingest::{InMemoryBus, IngestWorker, IngestWorkerConfig};
use store::{RedbBackend, ThreadStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).json().init();

    let cfg = AppConfig::load()?;
    info!(resource = "config", action = "load", "configuration loaded");

    let store: Arc<dyn ThreadStore> = Arc::new(RedbBackend::open(&cfg.db.path)?);
    let dedup_engine: Arc<dyn DedupEngine> = Arc::new(DefaultDedupEngine::new(
        store.clone(),
        DistanceOracle::new(cfg.email.threshold),
        cfg.email.max_workers,
    ));

    let bus = Arc::new(InMemoryBus::new());
    seed_bus_from_read_dir(&bus, &cfg.email.read_dir).await?;

    let worker = Arc::new(IngestWorker::new(
        bus,
        dedup_engine,
        IngestWorkerConfig {
            read_dir: cfg.email.read_dir.clone(),
            poll_interval: cfg.bus.consumer.poll_interval(),
            min_commit_count: cfg.bus.consumer.min_commit_count,
            ..Default::default()
        },
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handle = {
        let worker = worker.clone();
        tokio::spawn(async move { worker.run(shutdown_rx).await })
    };

    let server_result = server::start_server(cfg.server, store).await;

    let _ = shutdown_tx.send(true);
    if let Err(e) = worker_handle.await {
        error!(resource = "worker", action = "stop", error = %e, "ingest worker task panicked");
    }

    server_result
}

/// Enumerate files already present under `read_dir` and publish one event
/// per file, since this binary has no standalone external producer process;
/// an operational deployment would instead point `InMemoryBus` (or a real
/// `BusSource`) at an actual upstream producer.
async fn seed_bus_from_read_dir(bus: &InMemoryBus, read_dir: &std::path::Path) -> anyhow::Result<()> {
    let mut entries = tokio::fs::read_dir(read_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        let payload = serde_json::to_vec(&serde_json::json!({ "file_name": file_name }))?;
        bus.publish(payload).await;
    }
    Ok(())
}
