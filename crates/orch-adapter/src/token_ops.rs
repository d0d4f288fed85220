//! Generic ERC20 `approve` and WETH-style `deposit` (wrap) call encoding.
//!
//! Every EVM protocol integration needs the same two token-level operations before
//! its own call can run — approving the pool as spender, wrapping native currency
//! into its ERC20 wrapper. Neither depends on which protocol the funds are headed
//! to, so they're encoded here once rather than duplicated behind each
//! `ProtocolAdapter::encode_step`.

use crate::traits::AdapterError;
use alloy_primitives::{Address, U256};
use alloy_sol_types::{SolCall, sol};
use orch_types::payload::{EvmPayload, TxPayload};
use serde::Deserialize;
use std::str::FromStr;

sol! {
    interface IErc20 {
        function approve(address spender, uint256 amount) external returns (bool);
    }
    interface IWeth {
        function deposit() external payable;
    }
}

/// `{"token": "0x...", "spender": "0x...", "amount": "1000000", "chain_ref": 42161}`
#[derive(Debug, Deserialize)]
pub struct ApproveArgs {
    pub token: String,
    pub spender: String,
    pub amount: String,
    pub chain_ref: u64,
}

/// `{"weth": "0x...", "amount_wei": "1000000000000000000", "chain_ref": 42161}`
#[derive(Debug, Deserialize)]
pub struct WrapArgs {
    pub weth: String,
    pub amount_wei: String,
    pub chain_ref: u64,
}

fn parse_address(s: &str) -> Result<Address, AdapterError> {
    Address::from_str(s).map_err(|e| AdapterError::InvalidArguments(e.to_string()))
}

fn parse_amount(s: &str) -> Result<U256, AdapterError> {
    U256::from_str(s).map_err(|e| AdapterError::InvalidArguments(e.to_string()))
}

pub fn encode_approve(args: &serde_json::Value) -> Result<TxPayload, AdapterError> {
    let args: ApproveArgs =
        serde_json::from_value(args.clone()).map_err(|e| AdapterError::InvalidArguments(e.to_string()))?;
    parse_address(&args.token)?;
    let call = IErc20::approveCall {
        spender: parse_address(&args.spender)?,
        amount: parse_amount(&args.amount)?,
    };
    Ok(TxPayload::Evm(EvmPayload {
        to: args.token,
        value: "0".into(),
        data: format!("0x{}", alloy_primitives::hex::encode(call.abi_encode())),
        chain_ref: args.chain_ref,
        gas_limit: None,
        max_fee_per_gas_wei: None,
        max_priority_fee_per_gas_wei: None,
    }))
}

pub fn encode_wrap(args: &serde_json::Value) -> Result<TxPayload, AdapterError> {
    let args: WrapArgs =
        serde_json::from_value(args.clone()).map_err(|e| AdapterError::InvalidArguments(e.to_string()))?;
    let call = IWeth::depositCall {};
    Ok(TxPayload::Evm(EvmPayload {
        to: args.weth,
        value: args.amount_wei,
        data: format!("0x{}", alloy_primitives::hex::encode(call.abi_encode())),
        chain_ref: args.chain_ref,
        gas_limit: None,
        max_fee_per_gas_wei: None,
        max_priority_fee_per_gas_wei: None,
    }))
}
