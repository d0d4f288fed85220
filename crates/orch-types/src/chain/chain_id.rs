//! CAIP-2-style chain identifiers and the `ChainFamily` each namespace maps to.
//!
//! The orchestrator talks to four chain families (EVM, Solana, Aptos, Sui). Rather than
//! branch on chain name strings everywhere, every chain is addressed through a
//! [`ChainId`] (`namespace:reference`, e.g. `eip155:42161` or `solana:mainnet`) and the
//! namespace alone determines the [`ChainFamily`]. This mirrors how CAIP-2 chain IDs are
//! used to route between EVM/Solana/Aptos providers, generalized here to also carry Sui
//! and a gas-gating/L2 classification the execution pipeline needs.

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Which blockchain family a [`ChainId`]'s namespace belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainFamily {
    Evm,
    Solana,
    Aptos,
    Sui,
}

impl ChainFamily {
    /// Classify a CAIP-2 namespace into a chain family.
    pub fn from_namespace(namespace: &str) -> Option<Self> {
        match namespace {
            "eip155" => Some(ChainFamily::Evm),
            "solana" => Some(ChainFamily::Solana),
            "aptos" => Some(ChainFamily::Aptos),
            "sui" => Some(ChainFamily::Sui),
            _ => None,
        }
    }
}

/// A CAIP-2 compliant blockchain identifier: `namespace:reference`.
///
/// For EVM chains the reference is the numeric chain ID (`eip155:42161` for Arbitrum);
/// for Solana/Aptos/Sui the reference is a network slug or genesis-derived identifier
/// (`solana:mainnet`, `aptos:1`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChainId {
    pub namespace: String,
    pub reference: String,
}

impl ChainId {
    pub fn new<N: Into<String>, R: Into<String>>(namespace: N, reference: R) -> Self {
        Self {
            namespace: namespace.into(),
            reference: reference.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Which chain family this ID belongs to, if the namespace is recognised.
    pub fn family(&self) -> Option<ChainFamily> {
        ChainFamily::from_namespace(&self.namespace)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.reference)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid chain id format: {0}")]
pub struct ChainIdFormatError(String);

impl FromStr for ChainId {
    type Err = ChainIdFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.splitn(2, ':').collect();
        if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
            return Err(ChainIdFormatError(s.into()));
        }
        Ok(ChainId {
            namespace: parts[0].into(),
            reference: parts[1].into(),
        })
    }
}

impl Serialize for ChainId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ChainId::from_str(&s).map_err(de::Error::custom)
    }
}

/// A pattern for matching chain IDs, used by per-chain config sections (e.g. gas
/// thresholds that apply to a whole namespace or to a named set of chains).
#[derive(Debug, Clone)]
pub enum ChainIdPattern {
    Wildcard { namespace: String },
    Exact { namespace: String, reference: String },
    Set { namespace: String, references: HashSet<String> },
}

impl ChainIdPattern {
    pub fn wildcard<S: Into<String>>(namespace: S) -> Self {
        Self::Wildcard { namespace: namespace.into() }
    }

    pub fn exact<N: Into<String>, R: Into<String>>(namespace: N, reference: R) -> Self {
        Self::Exact { namespace: namespace.into(), reference: reference.into() }
    }

    pub fn matches(&self, chain_id: &ChainId) -> bool {
        match self {
            ChainIdPattern::Wildcard { namespace } => chain_id.namespace == *namespace,
            ChainIdPattern::Exact { namespace, reference } => {
                chain_id.namespace == *namespace && chain_id.reference == *reference
            }
            ChainIdPattern::Set { namespace, references } => {
                chain_id.namespace == *namespace && references.contains(&chain_id.reference)
            }
        }
    }
}

impl From<ChainId> for ChainIdPattern {
    fn from(chain_id: ChainId) -> Self {
        ChainIdPattern::exact(chain_id.namespace, chain_id.reference)
    }
}
