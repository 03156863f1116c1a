use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bus event payload: one per file to ingest.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestEvent {
    pub file_name: String,
    #[serde(default)]
    pub source_node: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub ingested_at: Option<DateTime<Utc>>,
}
