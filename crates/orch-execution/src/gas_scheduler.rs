//! Gas-price gating: holds back a step whose chain is currently too expensive to
//! transact on, until either the price falls back under the ceiling or the step's
//! own deadline elapses.
//!
//! L2s are exempt by default (their fees don't spike the way L1 gas auctions do);
//! the ceiling table is keyed by chain and only consulted for chains that set one.

use orch_types::chain::{ChainId, chain_meta};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    Wait,
}

/// Per-chain gas ceilings in Gwei (EVM) or the chain's native fee unit. Chains absent
/// from the table are always allowed to proceed.
#[derive(Default)]
pub struct GasScheduler {
    ceilings_gwei: RwLock<HashMap<ChainId, u64>>,
}

impl GasScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the ceiling table from each known chain's default, then applies any
    /// config overrides in `overrides`.
    pub fn with_defaults(overrides: HashMap<ChainId, u64>) -> Self {
        let mut ceilings = HashMap::new();
        for (key, meta) in orch_types::chain::KNOWN_CHAINS {
            if let Some(default_gwei) = meta.default_gas_max_gwei {
                if let Ok(chain_id) = key.parse() {
                    ceilings.insert(chain_id, default_gwei);
                }
            }
        }
        ceilings.extend(overrides);
        Self {
            ceilings_gwei: RwLock::new(ceilings),
        }
    }

    pub fn set_ceiling(&self, chain_id: ChainId, max_gwei: u64) {
        self.ceilings_gwei.write().expect("ceilings lock poisoned").insert(chain_id, max_gwei);
    }

    /// Whether a step on `chain_id` may proceed given `current_gwei` as the chain's
    /// current gas price. Chains with no configured ceiling, and chains the static
    /// table marks as L2s, always proceed.
    pub fn decide(&self, chain_id: &ChainId, current_gwei: u64) -> GateDecision {
        if chain_meta(chain_id).map(|meta| meta.is_l2).unwrap_or(false) {
            return GateDecision::Proceed;
        }
        let ceilings = self.ceilings_gwei.read().expect("ceilings lock poisoned");
        match ceilings.get(chain_id) {
            Some(&ceiling) if current_gwei > ceiling => GateDecision::Wait,
            _ => GateDecision::Proceed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waits_when_price_exceeds_ceiling() {
        let scheduler = GasScheduler::new();
        let ethereum = ChainId::new("eip155", "1");
        scheduler.set_ceiling(ethereum.clone(), 30);

        assert_eq!(scheduler.decide(&ethereum, 25), GateDecision::Proceed);
        assert_eq!(scheduler.decide(&ethereum, 31), GateDecision::Wait);
    }

    #[test]
    fn l2_chains_always_proceed_regardless_of_ceiling() {
        let scheduler = GasScheduler::new();
        let arbitrum = ChainId::new("eip155", "42161");
        scheduler.set_ceiling(arbitrum.clone(), 1);

        assert_eq!(scheduler.decide(&arbitrum, 1_000_000), GateDecision::Proceed);
    }

    #[test]
    fn chains_without_a_ceiling_always_proceed() {
        let scheduler = GasScheduler::new();
        let unconfigured = ChainId::new("eip155", "999");
        assert_eq!(scheduler.decide(&unconfigured, u64::MAX), GateDecision::Proceed);
    }

    #[test]
    fn with_defaults_seeds_l1_ceilings_from_the_known_chain_table() {
        let scheduler = GasScheduler::with_defaults(HashMap::new());
        let ethereum = ChainId::new("eip155", "1");
        assert_eq!(scheduler.decide(&ethereum, 31), GateDecision::Wait);
        assert_eq!(scheduler.decide(&ethereum, 10), GateDecision::Proceed);
    }
}
