//! The at-least-once signal delivery abstraction the dispatcher consumes from.
//!
//! `dequeue` hands out a signal plus an opaque delivery handle; the dispatcher must
//! `ack` the handle once every step in the resulting plan has reached a terminal
//! status, or the signal becomes eligible for redelivery. This mirrors the
//! redelivery contract of a real broker (SQS/Kafka-style) without depending on one.

use async_trait::async_trait;
use orch_types::chain::ChainId;
use orch_types::signal::Signal;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("backend error: {0}")]
    Backend(String),
}

/// Opaque handle returned by `dequeue`, passed back to `ack`. Implementations may
/// encode a receipt/offset in here; callers must treat it as opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryHandle(pub String);

#[async_trait]
pub trait SignalQueue: Send + Sync {
    async fn enqueue(&self, signal: Signal) -> Result<(), QueueError>;

    /// Pull the next undelivered signal for a given chain, if any. Chain-scoped so
    /// the dispatcher's per-chain workers each drain only their own lane.
    async fn dequeue(&self, chain_id: &ChainId) -> Result<Option<(Signal, DeliveryHandle)>, QueueError>;

    async fn ack(&self, handle: DeliveryHandle) -> Result<(), QueueError>;
}
