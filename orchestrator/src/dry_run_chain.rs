//! Default `NonceSource`/`TxSimulator`/`Signer`/`ChainSubmitter`/`RouteSubmitter`
//! implementations wired in until a real alloy/Solana/Aptos RPC-backed set exists
//! (see `DESIGN.md`). Every step always simulates clean and "confirms" on the first
//! poll; nothing is ever broadcast to a chain or a route. This stands in regardless
//! of whether `SystemConfig::autopilot_dry_run` is set — that flag short-circuits
//! `TxExecutor` before any of these are called at all; these exist because no chain
//! client has been wired in yet.

use async_trait::async_trait;
use orch_execution::intent_router::{RouteDecision, RouteMethod, RouteSubmitter};
use orch_execution::key_vault::SignerSecret;
use orch_execution::nonce_manager::{NonceError, NonceSource};
use orch_execution::tx_executor::{ChainSubmitter, Confirmation, SignedTx, Signer};
use orch_execution::tx_simulator::{SimulationError, SimulationOutcome, TxSimulator};
use orch_types::chain::ChainId;
use orch_types::payload::TxPayload;
use orch_types::record::TxStatus;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct DryRunNonceSource;

#[async_trait]
impl NonceSource for DryRunNonceSource {
    async fn fetch_next_nonce(&self, _chain_id: &ChainId, _address: &str) -> Result<u64, NonceError> {
        Ok(0)
    }
}

pub struct DryRunSimulator;

#[async_trait]
impl TxSimulator for DryRunSimulator {
    async fn simulate(&self, _chain_id: &ChainId, _payload: &TxPayload) -> Result<SimulationOutcome, SimulationError> {
        Ok(SimulationOutcome {
            would_succeed: true,
            estimated_gas: None,
            estimated_amount_out: None,
            revert_reason: None,
        })
    }
}

pub struct DryRunSigner;

#[async_trait]
impl Signer for DryRunSigner {
    async fn sign(&self, _secret: &SignerSecret, _nonce: Option<u64>, _payload: &TxPayload) -> Result<SignedTx, String> {
        Ok(SignedTx(vec![0u8; 4]))
    }
}

/// Hands out a fresh `dry-run:<n>` hash per call so records stay distinguishable in
/// the audit log even though nothing is broadcast.
pub struct DryRunSubmitter {
    counter: AtomicU64,
}

impl DryRunSubmitter {
    pub fn new() -> Self {
        Self { counter: AtomicU64::new(0) }
    }
}

impl Default for DryRunSubmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainSubmitter for DryRunSubmitter {
    async fn submit(&self, _chain_id: &ChainId, _signed: &SignedTx) -> Result<String, String> {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        Ok(format!("dry-run:{n}"))
    }

    async fn poll_confirmation(&self, _chain_id: &ChainId, tx_hash: &str) -> Result<Confirmation, String> {
        Ok(Confirmation::Confirmed { tx_hash: tx_hash.to_string() })
    }
}

/// Fabricates an order ID per call and reports it immediately filled, standing in
/// for CoW/UniswapX/1inch Fusion/Flashbots Protect/MEV Blocker/Jupiter until a real
/// integration exists for each.
pub struct DryRunRouteSubmitter {
    counter: AtomicU64,
}

impl DryRunRouteSubmitter {
    pub fn new() -> Self {
        Self { counter: AtomicU64::new(0) }
    }
}

impl Default for DryRunRouteSubmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RouteSubmitter for DryRunRouteSubmitter {
    async fn submit_via_route(
        &self,
        method: RouteMethod,
        _chain_id: &ChainId,
        _owner: &str,
        _payload: &TxPayload,
    ) -> Result<RouteDecision, String> {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        Ok(RouteDecision {
            method,
            order_id: Some(format!("dry-run-order:{n}")),
            tx_hash: Some(format!("dry-run:{n}")),
            status: TxStatus::Submitted,
            mev_protection: false,
        })
    }
}
