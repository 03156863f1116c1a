use thiserror::Error;

use engine::EngineError;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("bus error: {0}")]
    Bus(String),
    #[error("malformed event payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("dedup engine error: {0}")]
    Engine(#[from] EngineError),
}
