use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("canonical thread {0} already exists")]
    DuplicateCanonicalThread(Uuid),
    #[error("document with file_name {0:?} already exists")]
    DuplicateFileName(String),
    #[error("canonical thread {0} not found")]
    ThreadNotFound(Uuid),
    #[error("cannot set parent of {child} to {attempted}: already parented by {existing}")]
    ConflictingParent {
        child: Uuid,
        existing: Uuid,
        attempted: Uuid,
    },
    #[error("backend encoding error: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend<E: std::fmt::Display>(err: E) -> Self {
        StoreError::Backend(err.to_string())
    }
}
