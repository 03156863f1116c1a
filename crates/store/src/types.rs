use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single ingested email file, bound to the canonical thread it was
/// deduplicated into.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub doc_id: Uuid,
    pub file_name: String,
    pub raw_content: Vec<u8>,
    pub cano_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A deduplicated thread variant: the representative content fingerprint,
/// the suffix fingerprint used for parent matching, and its position in the
/// reply DAG.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalThread {
    pub cano_id: Uuid,
    pub fp: u64,
    /// Fingerprint of the reply-chain suffix (all parts but the most recent
    /// one). `None` when `length == 1`, since there is no suffix.
    pub parent_fp: Option<u64>,
    pub length: u32,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CanonicalThread {
    pub fn is_orphan_candidate(&self) -> bool {
        self.parent_fp.is_some() && self.parent_id.is_none()
    }
}
