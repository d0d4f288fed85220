//! An in-memory FIFO-per-chain [`SignalQueue`](crate::queue::SignalQueue), for tests
//! and local development.

use crate::queue::{DeliveryHandle, QueueError, SignalQueue};
use async_trait::async_trait;
use dashmap::DashMap;
use orch_types::chain::ChainId;
use orch_types::signal::Signal;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Default)]
pub struct InMemorySignalQueue {
    lanes: DashMap<ChainId, Mutex<VecDeque<Signal>>>,
}

impl InMemorySignalQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SignalQueue for InMemorySignalQueue {
    async fn enqueue(&self, signal: Signal) -> Result<(), QueueError> {
        self.lanes
            .entry(signal.chain_id.clone())
            .or_default()
            .lock()
            .expect("lane mutex poisoned")
            .push_back(signal);
        Ok(())
    }

    async fn dequeue(&self, chain_id: &ChainId) -> Result<Option<(Signal, DeliveryHandle)>, QueueError> {
        let Some(lane) = self.lanes.get(chain_id) else {
            return Ok(None);
        };
        let mut lane = lane.lock().expect("lane mutex poisoned");
        Ok(lane.pop_front().map(|signal| {
            let handle = DeliveryHandle(signal.signal_id.clone());
            (signal, handle)
        }))
    }

    async fn ack(&self, _handle: DeliveryHandle) -> Result<(), QueueError> {
        // The in-memory lane already removed the signal on dequeue; a durable
        // broker implementation would delete/commit the offset here instead.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orch_types::signal::Action;

    fn sample(chain_id: ChainId, signal_id: &str) -> Signal {
        Signal {
            signal_id: signal_id.into(),
            strategy_id: "momentum-v2".into(),
            chain_id,
            protocol_id: "aave-v3".into(),
            action: Action::Enter,
            position_id: None,
            amount_usd: None,
            owner: "0xowner".into(),
            max_slippage_bps: None,
            urgency: orch_types::signal::Urgency::Normal,
            params: Default::default(),
            created_at_ms: 0,
        }
    }

    #[tokio::test]
    async fn dequeues_in_fifo_order_per_chain_lane() {
        let queue = InMemorySignalQueue::new();
        let chain = ChainId::new("eip155", "1");
        let other_chain = ChainId::new("solana", "mainnet");

        queue.enqueue(sample(chain.clone(), "sig-1")).await.unwrap();
        queue.enqueue(sample(other_chain.clone(), "sig-solana")).await.unwrap();
        queue.enqueue(sample(chain.clone(), "sig-2")).await.unwrap();

        let (first, _) = queue.dequeue(&chain).await.unwrap().unwrap();
        assert_eq!(first.signal_id, "sig-1");
        let (second, _) = queue.dequeue(&chain).await.unwrap().unwrap();
        assert_eq!(second.signal_id, "sig-2");
        assert!(queue.dequeue(&chain).await.unwrap().is_none());

        let (solana_signal, _) = queue.dequeue(&other_chain).await.unwrap().unwrap();
        assert_eq!(solana_signal.signal_id, "sig-solana");
    }
}
