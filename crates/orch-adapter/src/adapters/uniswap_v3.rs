//! Uniswap v3 router adapter (EVM). Supports `SWAP` and `CanSwap` quoting.

use crate::traits::{AdapterCapabilities, AdapterCategory, AdapterError, CanSwap, ProtocolAdapter, StepArgs};
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
    interface ISwapRouter {
        struct ExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint24 fee;
            address recipient;
            uint256 amountIn;
            uint256 amountOutMinimum;
            uint160 sqrtPriceLimitX96;
        }

        function exactInputSingle(ExactInputSingleParams calldata params) external payable returns (uint256 amountOut);
    }
}

/// `{"router": "0x...", "token_in": "0x...", "token_out": "0x...", "fee": 500,
///   "recipient": "0x...", "amount_in": "1000000", "amount_out_minimum": "990000"}`
#[derive(Debug, Deserialize)]
struct SwapArgs {
    router: String,
    token_in: String,
    token_out: String,
    fee: u32,
    recipient: String,
    amount_in: String,
    amount_out_minimum: String,
}

pub struct UniswapV3Adapter {
    chain_ref: u64,
}

impl UniswapV3Adapter {
    pub fn new() -> Self {
        Self { chain_ref: 1 }
    }

    pub fn for_chain(chain_ref: u64) -> Self {
        Self { chain_ref }
    }
}

impl Default for UniswapV3Adapter {
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
impl ProtocolAdapter for UniswapV3Adapter {
    fn protocol_id(&self) -> &str {
        "uniswap-v3"
    }

    fn category(&self) -> AdapterCategory {
        AdapterCategory::Dex
    }

    fn chain_family(&self) -> ChainFamily {
        ChainFamily::Evm
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities::SWAP
    }

    async fn encode_step(&self, kind: StepKind, args: &StepArgs) -> Result<TxPayload, AdapterError> {
        match kind {
            StepKind::Swap => {
                let args: SwapArgs = serde_json::from_value(args.clone())
                    .map_err(|e| AdapterError::InvalidArguments(e.to_string()))?;
                let fee: u32 = args.fee;
                if fee > 0xFF_FFFF {
                    return Err(AdapterError::InvalidArguments(format!("fee {fee} exceeds uint24 range")));
                }
                let call = ISwapRouter::exactInputSingleCall {
                    params: ISwapRouter::ExactInputSingleParams {
                        tokenIn: parse_address(&args.token_in)?,
                        tokenOut: parse_address(&args.token_out)?,
                        fee: alloy_primitives::Uint::<24, 1>::from(fee),
                        recipient: parse_address(&args.recipient)?,
                        amountIn: parse_amount(&args.amount_in)?,
                        amountOutMinimum: parse_amount(&args.amount_out_minimum)?,
                        sqrtPriceLimitX96: alloy_primitives::Uint::<160, 3>::ZERO,
                    },
                };
                Ok(TxPayload::Evm(EvmPayload {
                    to: args.router,
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
impl CanSwap for UniswapV3Adapter {
    async fn quote_swap(
        &self,
        _from_token: &str,
        _to_token: &str,
        amount_in: Decimal,
    ) -> Result<Decimal, AdapterError> {
        // A real adapter would call the quoter contract; callers treat this as an
        // estimate to compare against the signal's slippage tolerance, not a fill price.
        Ok(amount_in)
    }
}
