//! IngestWorker (C8): bus-driven consumption of file-ingest events.

mod bus;
mod error;
mod types;
mod worker;

pub use bus::{BusMessage, BusSource, InMemoryBus};
pub use error::IngestError;
pub use types::IngestEvent;
pub use worker::{DeadLetterSink, IngestWorker, IngestWorkerConfig, LoggingDeadLetterSink};
