//! Transport-agnostic bus abstraction. No Rust-ecosystem client exists for
//! the Kafka-shaped transport this was originally built against, so the
//! worker depends only on this trait; production deployments supply their
//! own [`BusSource`] implementation.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::error::IngestError;

/// One polled message and the offset needed to commit it.
#[derive(Clone, Debug)]
pub struct BusMessage {
    pub offset: u64,
    pub payload: Vec<u8>,
}

#[async_trait]
pub trait BusSource: Send + Sync {
    /// Poll for the next message, waiting up to `timeout`. Returns `None` on
    /// a timeout with nothing available.
    async fn poll(&self, timeout: Duration) -> Result<Option<BusMessage>, IngestError>;

    /// Commit up through `offset`, inclusive.
    async fn commit(&self, offset: u64) -> Result<(), IngestError>;
}

/// Bounded in-memory bus for tests and single-process deployments where the
/// producer and worker share an address space.
pub struct InMemoryBus {
    queue: Mutex<VecDeque<BusMessage>>,
    next_offset: Mutex<u64>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            next_offset: Mutex::new(0),
        }
    }

    /// Enqueue a payload for the next `poll`, assigning it the next offset.
    pub async fn publish(&self, payload: Vec<u8>) -> u64 {
        let mut next = self.next_offset.lock().await;
        let offset = *next;
        *next += 1;
        self.queue.lock().await.push_back(BusMessage { offset, payload });
        offset
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BusSource for InMemoryBus {
    async fn poll(&self, _timeout: Duration) -> Result<Option<BusMessage>, IngestError> {
        Ok(self.queue.lock().await.pop_front())
    }

    async fn commit(&self, _offset: u64) -> Result<(), IngestError> {
        // The in-memory bus has no durable offset log to advance; commit is
        // a no-op beyond acknowledging the call succeeded.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_then_poll_round_trips_in_fifo_order() {
        let bus = InMemoryBus::new();
        bus.publish(b"one".to_vec()).await;
        bus.publish(b"two".to_vec()).await;

        let first = bus.poll(Duration::from_millis(10)).await.unwrap().unwrap();
        let second = bus.poll(Duration::from_millis(10)).await.unwrap().unwrap();
        assert_eq!(first.payload, b"one");
        assert_eq!(second.payload, b"two");
        assert!(bus.poll(Duration::from_millis(10)).await.unwrap().is_none());
    }
}
