//! Default [`GasPriceSource`] wired in until a real fee-history RPC client exists
//! (see `DESIGN.md`). Each chain reads back a fixed low price, so the gate defaults
//! to pass-through; `set` lets a future live sampler (or a test) push real readings.

use async_trait::async_trait;
use dashmap::DashMap;
use orch_dispatch::GasPriceSource;
use orch_types::chain::ChainId;

/// Gwei assumed for any chain with no reading pushed into the map yet. Low enough
/// that every configured ceiling passes by default.
const DEFAULT_GWEI: u64 = 1;

#[derive(Default)]
pub struct DryRunGasPriceSource {
    readings: DashMap<ChainId, u64>,
}

impl DryRunGasPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn set(&self, chain_id: ChainId, gwei: u64) {
        self.readings.insert(chain_id, gwei);
    }
}

#[async_trait]
impl GasPriceSource for DryRunGasPriceSource {
    async fn current_gwei(&self, chain_id: &ChainId) -> Option<u64> {
        Some(self.readings.get(chain_id).map(|v| *v).unwrap_or(DEFAULT_GWEI))
    }
}
