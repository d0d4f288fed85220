//! The enqueue-and-wait half of gas gating (`spec.md` §4.5): holds signals whose
//! chain is currently too expensive, and releases them once either the chain's gas
//! price falls back under its ceiling or the signal's own `max_wait` elapses.
//!
//! [`orch_execution::gas_scheduler::GasScheduler`] only answers the instantaneous
//! "can this proceed right now" question; this module is the queue built on top of
//! it. The polling loop itself (a 60s tick, started lazily on first enqueue, stopped
//! once the queue drains) is owned by the dispatcher, which already runs a tokio
//! task per chain lane — `tick` here is the pure, directly-testable unit the loop
//! calls each time it fires.

use async_trait::async_trait;
use orch_execution::gas_scheduler::{GasScheduler, GateDecision};
use orch_types::chain::ChainId;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// How the dispatcher's polling loop should space ticks, per `spec.md` §4.5.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Supplies the current gas price for a chain. A thin seam so `tick` can be unit
/// tested without a live RPC client.
#[async_trait]
pub trait GasPriceSource: Send + Sync {
    /// `None` if the price couldn't be sampled this tick (e.g. RPC timeout) — treated
    /// as "still expensive" so the item keeps waiting rather than releasing on stale
    /// information.
    async fn current_gwei(&self, chain_id: &ChainId) -> Option<u64>;
}

/// An item released from the queue, tagged with whether it cleared the gas gate
/// normally or was forced out by its deadline.
#[derive(Debug, Clone)]
pub struct Released<T> {
    pub item: T,
    /// `true` if released because `max_wait` elapsed while gas was still over
    /// ceiling. Per `spec.md` §4.5 the default disposition is still to execute, with
    /// a warning — the dispatcher decides what "with a warning" means for `T`.
    pub timed_out: bool,
}

struct QueuedItem<T> {
    item: T,
    chain_id: ChainId,
    enqueued_at: Instant,
    max_wait: Duration,
}

/// A FIFO, gas-gated holding queue for items of type `T` (typically a `Signal` or a
/// single `Step`). Not itself chain-keyed — each item carries its own `chain_id` so
/// one queue can hold work for every chain.
pub struct GasQueue<T> {
    scheduler: Arc<GasScheduler>,
    items: Mutex<VecDeque<QueuedItem<T>>>,
}

impl<T> GasQueue<T> {
    pub fn new(scheduler: Arc<GasScheduler>) -> Self {
        Self {
            scheduler,
            items: Mutex::new(VecDeque::new()),
        }
    }

    pub fn enqueue(&self, item: T, chain_id: ChainId, max_wait: Duration) {
        self.items.lock().expect("gas queue lock poisoned").push_back(QueuedItem {
            item,
            chain_id,
            enqueued_at: Instant::now(),
            max_wait,
        });
    }

    pub fn len(&self) -> usize {
        self.items.lock().expect("gas queue lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One polling tick: checks every currently-queued item against `prices` and the
    /// gas scheduler, releasing those whose chain now reads `Proceed` or whose
    /// `max_wait` has elapsed. Items enqueued by another task while this tick is
    /// running are preserved behind the survivors, never dropped.
    pub async fn tick(&self, prices: &dyn GasPriceSource) -> Vec<Released<T>> {
        let snapshot: Vec<QueuedItem<T>> = {
            let mut items = self.items.lock().expect("gas queue lock poisoned");
            items.drain(..).collect()
        };

        let mut released = Vec::new();
        let mut survivors = VecDeque::new();

        for queued in snapshot {
            let current_gwei = prices.current_gwei(&queued.chain_id).await;
            let decision = match current_gwei {
                Some(gwei) => self.scheduler.decide(&queued.chain_id, gwei),
                None => GateDecision::Wait,
            };

            if decision == GateDecision::Proceed {
                released.push(Released { item: queued.item, timed_out: false });
            } else if queued.enqueued_at.elapsed() >= queued.max_wait {
                released.push(Released { item: queued.item, timed_out: true });
            } else {
                survivors.push_back(queued);
            }
        }

        let mut items = self.items.lock().expect("gas queue lock poisoned");
        survivors.append(&mut items);
        *items = survivors;

        released
    }
}
