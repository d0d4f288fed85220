//! Per-chain-family transaction payloads.
//!
//! A single struct with optional fields per family would let a caller build an
//! `EvmPayload` with a Solana `recentBlockhash` set by accident; a tagged enum makes
//! that unrepresentable, so each family gets its own shape and callers match on
//! [`TxPayload`] instead of checking which optional fields happen to be populated.

use serde::{Deserialize, Serialize};

/// An EVM transaction request prior to signing. Gas fields are filled in by the
/// gas scheduler/executor, not the planner, so they start out unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvmPayload {
    pub to: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub data: String,
    pub chain_ref: u64,
    #[serde(default)]
    pub gas_limit: Option<u64>,
    #[serde(default)]
    pub max_fee_per_gas_wei: Option<String>,
    #[serde(default)]
    pub max_priority_fee_per_gas_wei: Option<String>,
}

/// A Solana transaction message prior to signing: a list of instructions plus the
/// accounts they touch, encoded as base58/base64 per the wire format in use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolanaPayload {
    pub program_id: String,
    pub accounts: Vec<SolanaAccountMeta>,
    /// Base64-encoded instruction data.
    pub data_b64: String,
    #[serde(default)]
    pub compute_unit_limit: Option<u32>,
    #[serde(default)]
    pub compute_unit_price_micro_lamports: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolanaAccountMeta {
    pub pubkey: String,
    pub is_signer: bool,
    pub is_writable: bool,
}

/// An Aptos Move entry-function call prior to signing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AptosPayload {
    /// `<address>::<module>::<function>`
    pub function: String,
    #[serde(default)]
    pub type_arguments: Vec<String>,
    pub arguments: Vec<serde_json::Value>,
    #[serde(default)]
    pub max_gas_amount: Option<u64>,
    #[serde(default)]
    pub gas_unit_price: Option<u64>,
}

/// The chain-family-tagged transaction body a [`crate::plan::Step`] resolves to once
/// the protocol adapter has encoded it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum TxPayload {
    Evm(EvmPayload),
    Solana(SolanaPayload),
    Aptos(AptosPayload),
}

impl TxPayload {
    pub fn family_name(&self) -> &'static str {
        match self {
            TxPayload::Evm(_) => "evm",
            TxPayload::Solana(_) => "solana",
            TxPayload::Aptos(_) => "aptos",
        }
    }
}
