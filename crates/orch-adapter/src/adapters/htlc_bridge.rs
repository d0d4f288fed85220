//! Generic hash-time-locked bridge adapter (EVM legs). Encodes the lock/claim calls
//! a cross-chain rebalance's bridge leg needs. Registered under the fixed protocol
//! id `"htlc-bridge"`, distinct from whichever yield protocol the funds are headed
//! to or from — the planner selects it by name rather than by the signal's
//! `protocol_id`, since a rebalance's two legs can target different protocols
//! entirely.

use crate::traits::{AdapterCapabilities, AdapterCategory, AdapterError, ProtocolAdapter, StepArgs};
use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{SolCall, sol};
use async_trait::async_trait;
use orch_types::chain::ChainFamily;
use orch_types::payload::{EvmPayload, TxPayload};
use orch_types::plan::StepKind;
use serde::Deserialize;
use std::str::FromStr;

sol! {
    interface IHtlcBridge {
        function lock(bytes32 secretHash, address token, uint256 amount, uint256 destChainRef, address destRecipient) external;
        function claim(bytes32 secretHash, bytes32 secret) external;
    }
}

/// `{"bridge": "0x...", "secret_hash": "0x...", "token": "0x...", "amount": "1000000",
///   "dest_chain_ref": 10, "dest_recipient": "0x...", "chain_ref": 42161}`
#[derive(Debug, Deserialize)]
struct LockArgs {
    bridge: String,
    secret_hash: String,
    token: String,
    amount: String,
    dest_chain_ref: u64,
    dest_recipient: String,
    chain_ref: u64,
}

/// `{"bridge": "0x...", "secret_hash": "0x...", "secret": "0x...", "chain_ref": 10}`
#[derive(Debug, Deserialize)]
struct ClaimArgs {
    bridge: String,
    secret_hash: String,
    secret: String,
    chain_ref: u64,
}

pub struct HtlcBridgeAdapter;

impl HtlcBridgeAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HtlcBridgeAdapter {
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

fn parse_hash(s: &str) -> Result<B256, AdapterError> {
    B256::from_str(s).map_err(|e| AdapterError::InvalidArguments(e.to_string()))
}

#[async_trait]
impl ProtocolAdapter for HtlcBridgeAdapter {
    fn protocol_id(&self) -> &str {
        "htlc-bridge"
    }

    fn category(&self) -> AdapterCategory {
        AdapterCategory::Bridge
    }

    fn chain_family(&self) -> ChainFamily {
        ChainFamily::Evm
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities::empty()
    }

    async fn encode_step(&self, kind: StepKind, args: &StepArgs) -> Result<TxPayload, AdapterError> {
        match kind {
            StepKind::BridgeLock => {
                let args: LockArgs =
                    serde_json::from_value(args.clone()).map_err(|e| AdapterError::InvalidArguments(e.to_string()))?;
                let call = IHtlcBridge::lockCall {
                    secretHash: parse_hash(&args.secret_hash)?,
                    token: parse_address(&args.token)?,
                    amount: parse_amount(&args.amount)?,
                    destChainRef: U256::from(args.dest_chain_ref),
                    destRecipient: parse_address(&args.dest_recipient)?,
                };
                Ok(TxPayload::Evm(EvmPayload {
                    to: args.bridge,
                    value: "0".into(),
                    data: format!("0x{}", alloy_primitives::hex::encode(call.abi_encode())),
                    chain_ref: args.chain_ref,
                    gas_limit: None,
                    max_fee_per_gas_wei: None,
                    max_priority_fee_per_gas_wei: None,
                }))
            }
            StepKind::BridgeClaim => {
                let args: ClaimArgs =
                    serde_json::from_value(args.clone()).map_err(|e| AdapterError::InvalidArguments(e.to_string()))?;
                let call = IHtlcBridge::claimCall {
                    secretHash: parse_hash(&args.secret_hash)?,
                    secret: parse_hash(&args.secret)?,
                };
                Ok(TxPayload::Evm(EvmPayload {
                    to: args.bridge,
                    value: "0".into(),
                    data: format!("0x{}", alloy_primitives::hex::encode(call.abi_encode())),
                    chain_ref: args.chain_ref,
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
