use thiserror::Error;

use store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("raw content for {0:?} split into zero parts")]
    EmptySplit(String),
}
