use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use engine::{DedupEngine, EngineError};
use store::StoreError;

use crate::bus::BusSource;
use crate::error::IngestError;
use crate::types::IngestEvent;

#[derive(Clone, Debug)]
pub struct IngestWorkerConfig {
    /// Directory files are read from; `file_name` from the event is joined
    /// onto this.
    pub read_dir: PathBuf,
    pub poll_interval: Duration,
    /// Commit offsets after this many successfully processed messages.
    pub min_commit_count: u64,
    /// Retry count past which a failing event is routed to the dead-letter
    /// sink instead of being redelivered indefinitely. `None` disables
    /// dead-lettering.
    pub max_retry_count: Option<u32>,
}

impl Default for IngestWorkerConfig {
    fn default() -> Self {
        Self {
            read_dir: PathBuf::from("data/emails"),
            poll_interval: Duration::from_millis(250),
            min_commit_count: 10,
            max_retry_count: Some(5),
        }
    }
}

/// Destination for events that have exceeded `max_retry_count`.
pub trait DeadLetterSink: Send + Sync {
    fn send(&self, event: &IngestEvent, error: &IngestError);
}

/// Default sink: logs and drops. Sufficient for the core contract, which
/// does not require a durable dead-letter store.
pub struct LoggingDeadLetterSink;

impl DeadLetterSink for LoggingDeadLetterSink {
    fn send(&self, event: &IngestEvent, error: &IngestError) {
        warn!(
            resource = "bus",
            action = "dead_letter",
            file_name = %event.file_name,
            retry_count = event.retry_count,
            error = %error,
            "event exceeded retry bound, routing to dead letter"
        );
    }
}

pub struct IngestWorker {
    bus: Arc<dyn BusSource>,
    engine: Arc<dyn DedupEngine>,
    dead_letter: Arc<dyn DeadLetterSink>,
    config: IngestWorkerConfig,
}

impl IngestWorker {
    pub fn new(bus: Arc<dyn BusSource>, engine: Arc<dyn DedupEngine>, config: IngestWorkerConfig) -> Self {
        Self {
            bus,
            engine,
            dead_letter: Arc::new(LoggingDeadLetterSink),
            config,
        }
    }

    pub fn with_dead_letter_sink(mut self, sink: Arc<dyn DeadLetterSink>) -> Self {
        self.dead_letter = sink;
        self
    }

    /// Run until `shutdown` signals true. Batches commits: after every
    /// `min_commit_count` successfully-processed events (including
    /// duplicate-delivery successes and poison-pill drops), commits the bus
    /// offset of the most recently processed event.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut processed_since_commit: u64 = 0;
        let mut last_offset: Option<u64> = None;

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                message = self.bus.poll(self.config.poll_interval) => {
                    match message {
                        Ok(Some(msg)) => {
                            last_offset = Some(msg.offset);
                            if self.process_one(&msg.payload).await {
                                processed_since_commit += 1;
                            }
                            if processed_since_commit >= self.config.min_commit_count {
                                if let Some(offset) = last_offset {
                                    if let Err(e) = self.bus.commit(offset).await {
                                        warn!(resource = "bus", action = "commit", error = %e, "failed to commit offset batch");
                                    } else {
                                        processed_since_commit = 0;
                                    }
                                }
                            }
                        }
                        Ok(None) => {}
                        Err(e) => warn!(resource = "bus", action = "poll", error = %e, "poll failed"),
                    }
                }
            }
        }

        if processed_since_commit > 0 {
            if let Some(offset) = last_offset {
                let _ = self.bus.commit(offset).await;
            }
        }
    }

    /// Process a single polled payload. Returns whether the event should
    /// count toward the commit batch (true for both genuine success and
    /// cases that are acknowledged without redelivery).
    async fn process_one(&self, payload: &[u8]) -> bool {
        let event: IngestEvent = match serde_json::from_slice(payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    resource = "bus",
                    action = "decode",
                    error = %e,
                    "malformed event payload, acknowledging as poison pill"
                );
                return true;
            }
        };

        let path = self.config.read_dir.join(&event.file_name);
        let raw = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(source) => {
                let err = IngestError::Io {
                    path: path.display().to_string(),
                    source,
                };
                return self.handle_failure(&event, err).await;
            }
        };

        match self.engine.ingest(&event.file_name, &raw).await {
            Ok(result) => {
                info!(
                    resource = "thread",
                    action = "ingest",
                    file_name = %event.file_name,
                    cano_id = %result.cano_id,
                    "ingested event"
                );
                true
            }
            Err(EngineError::Store(StoreError::DuplicateFileName(name))) => {
                warn!(
                    resource = "thread",
                    action = "ingest",
                    file_name = %name,
                    "duplicate delivery, treating as success"
                );
                true
            }
            Err(e) => self.handle_failure(&event, IngestError::Engine(e)).await,
        }
    }

    async fn handle_failure(&self, event: &IngestEvent, error: IngestError) -> bool {
        let exceeded = self
            .config
            .max_retry_count
            .is_some_and(|bound| event.retry_count >= bound);

        if exceeded {
            self.dead_letter.send(event, &error);
            true
        } else {
            warn!(
                resource = "thread",
                action = "ingest",
                file_name = %event.file_name,
                retry_count = event.retry_count,
                error = %error,
                "ingest failed, leaving offset uncommitted for redelivery"
            );
            false
        }
    }
}
