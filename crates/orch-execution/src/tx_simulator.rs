//! Dry-runs a step's encoded payload against chain state before it is ever signed or
//! broadcast, so a reverting call is caught as `SimulationFailed`/`Reverted` instead
//! of burning gas on-chain.

use async_trait::async_trait;
use orch_types::chain::ChainId;
use orch_types::payload::TxPayload;
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutcome {
    pub would_succeed: bool,
    pub estimated_gas: Option<u64>,
    pub estimated_amount_out: Option<Decimal>,
    pub revert_reason: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("simulation RPC call failed: {0}")]
    RpcFailed(String),
    #[error("simulation timed out")]
    Timeout,
}

/// Implemented once per chain family (EVM `eth_call`, Solana `simulateTransaction`,
/// Aptos `simulate_transaction`) by whatever RPC client the executor is wired with.
#[async_trait]
pub trait TxSimulator: Send + Sync {
    async fn simulate(&self, chain_id: &ChainId, payload: &TxPayload) -> Result<SimulationOutcome, SimulationError>;
}
