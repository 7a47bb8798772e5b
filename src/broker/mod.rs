//! Broker capability interface and implementations.
//!
//! The pipeline only ever needs three operations from a broker: append a
//! keyed record and learn whether it landed ([`Producer::send`]), receive
//! the next record for a consumer group member ([`Consumer::poll`]), and
//! acknowledge progress ([`Consumer::commit`]). Anything that provides them
//! can carry jobs between stages.
//!
//! # Implementations
//!
//! - [`InMemoryBroker`]: partitioned append log with consumer groups, used
//!   in-process by tests and standalone mode, and behind the broker service.
//! - [`HttpProducer`] / [`HttpConsumer`]: clients of the broker service
//!   ([`server`]), so stages can run as separate processes.

pub mod http;
pub mod memory;
pub mod protocol;
pub mod record;
pub mod server;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::BrokerError;

pub use http::{HttpBroker, HttpConsumer, HttpProducer};
pub use memory::{InMemoryBroker, MemoryConsumer};
pub use record::{Delivery, Record, TopicPartition};

#[async_trait]
pub trait Producer: Send + Sync {
    /// Append a keyed record to `topic`. Resolves once the broker has
    /// accepted or rejected it; callers bound the wait themselves.
    async fn send(&self, topic: &str, key: &str, payload: Vec<u8>)
        -> Result<Delivery, BrokerError>;
}

#[async_trait]
pub trait Consumer: Send {
    /// Wait up to `timeout` for the next record.
    ///
    /// `None` means nothing arrived in time; `Some(Err(_))` is a transient
    /// broker condition and the caller should simply poll again.
    async fn poll(&mut self, timeout: Duration) -> Option<Result<Record, BrokerError>>;

    /// Mark `record` (and everything before it in its partition) consumed
    /// for this consumer's group.
    async fn commit(&mut self, record: &Record) -> Result<(), BrokerError>;

    /// Give up group membership. Called once when a run-loop stops.
    async fn close(&mut self) {}
}
