//! Jupiter aggregator adapter (Solana). Stubbed relative to the EVM adapters: it
//! exercises the registry across chain families but does not encode a real swap
//! instruction, since Jupiter's route encoding comes from its off-chain quote API
//! rather than a fixed ABI the way Uniswap's router is.

use crate::traits::{AdapterCapabilities, AdapterCategory, AdapterError, CanSwap, ProtocolAdapter, StepArgs};
use async_trait::async_trait;
use orch_types::chain::ChainFamily;
use orch_types::payload::TxPayload;
use orch_types::plan::StepKind;
use rust_decimal::Decimal;

pub struct JupiterAdapter;

impl JupiterAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JupiterAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolAdapter for JupiterAdapter {
    fn protocol_id(&self) -> &str {
        "jupiter"
    }

    fn category(&self) -> AdapterCategory {
        AdapterCategory::Dex
    }

    fn chain_family(&self) -> ChainFamily {
        ChainFamily::Solana
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities::SWAP
    }

    async fn encode_step(&self, kind: StepKind, _args: &StepArgs) -> Result<TxPayload, AdapterError> {
        Err(AdapterError::UnsupportedStep {
            protocol_id: self.protocol_id().to_string(),
            step_kind: kind,
        })
    }
}

#[async_trait]
impl CanSwap for JupiterAdapter {
    async fn quote_swap(
        &self,
        _from_token: &str,
        _to_token: &str,
        _amount_in: Decimal,
    ) -> Result<Decimal, AdapterError> {
        Err(AdapterError::QuoteUnavailable(
            "jupiter route encoding requires the off-chain quote API, not yet wired".into(),
        ))
    }
}
