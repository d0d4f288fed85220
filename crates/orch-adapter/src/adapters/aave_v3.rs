//! Aave v3 lending-pool adapter (EVM). Supports `DEPOSIT`/`WITHDRAW` and advertises
//! `CanQuote` so the planner can price a position's underlying value.

use crate::traits::{AdapterCapabilities, AdapterCategory, AdapterError, CanQuote, ProtocolAdapter, StepArgs};
use alloy_primitives::{Address, U256};
use alloy_sol_types::{SolCall, sol};
use async_trait::async_trait;
use orch_types::chain::ChainFamily;
use orch_types::payload::{EvmPayload, TxPayload};
use orch_types::plan::StepKind;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

sol! {
    interface IAaveV3Pool {
        function supply(address asset, uint256 amount, address onBehalfOf, uint16 referralCode) external;
        function withdraw(address asset, uint256 amount, address to) external returns (uint256);
    }
}

/// `{"pool": "0x...", "asset": "0x...", "amount": "1000000", "on_behalf_of": "0x..."}`
#[derive(Debug, Deserialize)]
struct DepositArgs {
    pool: String,
    asset: String,
    amount: String,
    on_behalf_of: String,
}

#[derive(Debug, Deserialize)]
struct WithdrawArgs {
    pool: String,
    asset: String,
    amount: String,
    to: String,
}

pub struct AaveV3Adapter {
    chain_ref: u64,
}

impl AaveV3Adapter {
    pub fn new() -> Self {
        Self { chain_ref: 1 }
    }

    pub fn for_chain(chain_ref: u64) -> Self {
        Self { chain_ref }
    }
}

impl Default for AaveV3Adapter {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_address(s: &str) -> Result<Address, AdapterError> {
    Address::from_str(s).map_err(|e| AdapterError::InvalidArguments(e.to_string()))
}

fn parse_amount(s: &str) -> Result<U256, AdapterError> {
    U256::from_str(s).map_err(|e| AdapterError::InvalidArguments(e.to_string()))
}

#[async_trait]
impl ProtocolAdapter for AaveV3Adapter {
    fn protocol_id(&self) -> &str {
        "aave-v3"
    }

    fn category(&self) -> AdapterCategory {
        AdapterCategory::Lending
    }

    fn chain_family(&self) -> ChainFamily {
        ChainFamily::Evm
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities::QUOTE
    }

    async fn encode_step(&self, kind: StepKind, args: &StepArgs) -> Result<TxPayload, AdapterError> {
        match kind {
            StepKind::Deposit => {
                let args: DepositArgs = serde_json::from_value(args.clone())
                    .map_err(|e| AdapterError::InvalidArguments(e.to_string()))?;
                let call = IAaveV3Pool::supplyCall {
                    asset: parse_address(&args.asset)?,
                    amount: parse_amount(&args.amount)?,
                    onBehalfOf: parse_address(&args.on_behalf_of)?,
                    referralCode: 0,
                };
                Ok(TxPayload::Evm(EvmPayload {
                    to: args.pool,
                    value: "0".into(),
                    data: format!("0x{}", alloy_primitives::hex::encode(call.abi_encode())),
                    chain_ref: self.chain_ref,
                    gas_limit: None,
                    max_fee_per_gas_wei: None,
                    max_priority_fee_per_gas_wei: None,
                }))
            }
            StepKind::Withdraw => {
                let args: WithdrawArgs = serde_json::from_value(args.clone())
                    .map_err(|e| AdapterError::InvalidArguments(e.to_string()))?;
                let call = IAaveV3Pool::withdrawCall {
                    asset: parse_address(&args.asset)?,
                    amount: parse_amount(&args.amount)?,
                    to: parse_address(&args.to)?,
                };
                Ok(TxPayload::Evm(EvmPayload {
                    to: args.pool,
                    value: "0".into(),
                    data: format!("0x{}", alloy_primitives::hex::encode(call.abi_encode())),
                    chain_ref: self.chain_ref,
                    gas_limit: None,
                    max_fee_per_gas_wei: None,
                    max_priority_fee_per_gas_wei: None,
                }))
            }
            other => Err(AdapterError::UnsupportedStep {
                protocol_id: self.protocol_id().to_string(),
                step_kind: other,
            }),
        }
    }
}

#[async_trait]
impl CanQuote for AaveV3Adapter {
    async fn quote_usd(&self, _asset: &str, amount: Decimal) -> Result<Decimal, AdapterError> {
        // Aave aTokens are 1:1 with the underlying; no pricing oracle call needed here.
        Ok(amount)
    }
}
