//! DedupEngine (C6): the ingest pipeline that turns raw email bytes into a
//! Document bound to a (possibly newly created) CanonicalThread, maintaining
//! the parent/child reply DAG as it goes.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex, Semaphore};
use tracing::{info, warn};
use uuid::Uuid;

use fingerprint::fingerprint;
use splitter::split;
use store::{CanonicalThread, Document, StoreError, ThreadStore};

use crate::distance::DistanceOracle;
use crate::error::EngineError;
use crate::metrics::{metrics_recorder, IngestOutcome};

/// Public ingest contract. A result carries the canonical thread id the
/// content was bound to, whether that thread was newly created, and how
/// many previously-orphaned threads were adopted as its children.
#[derive(Clone, Copy, Debug)]
pub struct IngestResult {
    pub cano_id: Uuid,
    pub created_new_thread: bool,
    pub adopted_children: usize,
}

#[async_trait]
pub trait DedupEngine: Send + Sync {
    async fn ingest(&self, file_name: &str, raw_content: &[u8]) -> Result<IngestResult, EngineError>;
}

/// Production implementation. Fingerprinting is dispatched to the blocking
/// thread pool behind a semaphore sized to `max_workers`; ingests are
/// serialized per reply-chain length via an in-process advisory lock, since
/// distributed coordination across workers is out of scope.
pub struct DefaultDedupEngine {
    store: Arc<dyn ThreadStore>,
    oracle: DistanceOracle,
    fingerprint_permits: Arc<Semaphore>,
    length_locks: Arc<DashMap<u32, Arc<Mutex<()>>>>,
}

impl DefaultDedupEngine {
    pub fn new(store: Arc<dyn ThreadStore>, oracle: DistanceOracle, max_workers: usize) -> Self {
        Self {
            store,
            oracle,
            fingerprint_permits: Arc::new(Semaphore::new(max_workers.max(1))),
            length_locks: Arc::new(DashMap::new()),
        }
    }

    async fn fingerprint_offloaded(&self, text: String) -> Result<u64, EngineError> {
        let permit = self
            .fingerprint_permits
            .clone()
            .acquire_owned()
            .await
            .expect("fingerprint semaphore is never closed");
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            fingerprint(&text)
        });
        Ok(handle.await.expect("fingerprint worker task panicked"))
    }

    fn lock_for_length(&self, length: u32) -> Arc<Mutex<()>> {
        self.length_locks.entry(length).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// First candidate (in store-returned order) whose fingerprint is within
    /// threshold of `fp`.
    fn first_match(&self, candidates: &[CanonicalThread], fp: u64) -> Option<Uuid> {
        candidates
            .iter()
            .find(|c| self.oracle.near_duplicate(fp, c.fp))
            .map(|c| c.cano_id)
    }
}

#[async_trait]
impl DedupEngine for DefaultDedupEngine {
    async fn ingest(&self, file_name: &str, raw_content: &[u8]) -> Result<IngestResult, EngineError> {
        let started = Instant::now();

        // Prepare. Every fingerprint this ingest could possibly need is
        // computed up front, before the unit of work opens, because the
        // session a single ingest holds maps to one store transaction
        // (§4.5) that must never be held across an `.await` point.
        let raw_text = String::from_utf8_lossy(raw_content).into_owned();
        let parts = split(&raw_text);
        let length = parts.len() as u32;
        if parts.is_empty() {
            return Err(EngineError::EmptySplit(file_name.to_string()));
        }
        let fp_full = self.fingerprint_offloaded(raw_text.clone()).await?;
        let parent_fp = if length > 1 {
            let suffix: String = parts[1..].concat();
            Some(self.fingerprint_offloaded(suffix).await?)
        } else {
            None
        };

        // Serialize the rest of the pipeline per length bucket: two ingests
        // of near-duplicate content at the same length must not both miss
        // the dedup search and create two canonical classes.
        let lock = self.lock_for_length(length);
        let _guard = lock.lock().await;

        // Everything from here on runs synchronously against one session,
        // so either all of it lands or none of it does.
        let mut session = self.store.begin_write()?;

        // Dedup search.
        let candidates = session.find_candidates_by_length(length)?;
        let existing = self.first_match(&candidates, fp_full);

        let (cano_id, created_new_thread, adopted_children) = match existing {
            Some(cano_id) => (cano_id, false, 0),
            None => {
                let now = Utc::now();
                let new_cano_id = Uuid::new_v4();

                let parent_id = match parent_fp {
                    Some(fp_parent) if length > 1 => {
                        let pcands = session.find_candidates_by_length(length - 1)?;
                        self.first_match(&pcands, fp_parent)
                    }
                    _ => None,
                };

                let new_ct = CanonicalThread {
                    cano_id: new_cano_id,
                    fp: fp_full,
                    parent_fp,
                    length,
                    parent_id,
                    created_at: now,
                    updated_at: now,
                };
                session.insert_canonical_thread(new_ct)?;

                // Orphan adoption: scan the full list, not first-match, so a
                // single new parent can adopt multiple pre-existing orphans.
                let orphans = session.find_orphan_candidates_by_length(length + 1)?;
                let mut adopted = 0usize;
                for orphan in orphans {
                    let parent_fp_of_orphan = match orphan.parent_fp {
                        Some(fp) => fp,
                        None => continue,
                    };
                    if self.oracle.near_duplicate(fp_full, parent_fp_of_orphan) {
                        match session.set_parent(orphan.cano_id, new_cano_id) {
                            Ok(()) => adopted += 1,
                            Err(StoreError::ConflictingParent { .. }) => {
                                warn!(
                                    resource = "thread",
                                    action = "adopt",
                                    cano_id = %orphan.cano_id,
                                    "orphan already adopted by a concurrent ingest"
                                );
                            }
                            Err(e) => return Err(e.into()),
                        }
                    }
                }

                (new_cano_id, true, adopted)
            }
        };

        // Persist. Document binding and the rest of this unit of work commit
        // together, as one transaction.
        let doc = Document {
            doc_id: Uuid::new_v4(),
            file_name: file_name.to_string(),
            raw_content: raw_content.to_vec(),
            cano_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        session.insert_document(doc)?;
        session.commit()?;

        let outcome = if created_new_thread {
            IngestOutcome::CreatedNew
        } else {
            IngestOutcome::MatchedExisting
        };
        if let Some(recorder) = metrics_recorder() {
            recorder.record_ingest(outcome, started.elapsed(), adopted_children);
        }
        info!(
            resource = "thread",
            action = "ingest",
            file_name,
            %cano_id,
            created_new_thread,
            adopted_children,
            "ingest complete"
        );

        Ok(IngestResult {
            cano_id,
            created_new_thread,
            adopted_children,
        })
    }
}
