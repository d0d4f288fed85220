//! Chain registry: well-known networks, per-chain static metadata, and the generic
//! `FromConfig` construction pattern used throughout the orchestrator to build
//! providers/registries from configuration without reaching for global singletons.

mod chain_id;

pub use chain_id::*;

use std::collections::HashMap;
use std::sync::Arc;

/// Asynchronously constructs `Self` from a configuration value.
///
/// Every long-lived, wired-at-startup component (chain providers, the key vault,
/// the scheme/adapter registry) implements this instead of reading ambient globals.
#[async_trait::async_trait]
pub trait FromConfig<TConfig>
where
    Self: Sized,
{
    async fn from_config(config: &TConfig) -> Result<Self, Box<dyn std::error::Error + Send + Sync>>;
}

/// Common operations every chain provider exposes regardless of family.
pub trait ChainProviderOps {
    fn chain_id(&self) -> ChainId;
    /// Addresses of hot keys loaded for this chain (empty ⇒ PendingSignature-only mode).
    fn signer_addresses(&self) -> Vec<String>;
}

impl<T: ChainProviderOps> ChainProviderOps for Arc<T> {
    fn chain_id(&self) -> ChainId {
        (**self).chain_id()
    }
    fn signer_addresses(&self) -> Vec<String> {
        (**self).signer_addresses()
    }
}

/// Registry of configured chain providers indexed by chain ID.
#[derive(Debug)]
pub struct ChainRegistry<P>(HashMap<ChainId, P>);

impl<P> ChainRegistry<P> {
    pub fn new(providers: HashMap<ChainId, P>) -> Self {
        Self(providers)
    }

    pub fn by_chain_id(&self, chain_id: &ChainId) -> Option<&P> {
        self.0.get(chain_id)
    }

    pub fn by_chain_id_pattern(&self, pattern: &ChainIdPattern) -> Vec<&P> {
        self.0
            .iter()
            .filter_map(|(chain_id, provider)| pattern.matches(chain_id).then_some(provider))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ChainId, &P)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Static, hardcoded metadata about a well-known chain: native gas symbol, whether it is
/// an L2 (L2s skip gas gating per `spec.md` §4.5), and its default gas ceiling in Gwei.
#[derive(Debug, Clone, Copy)]
pub struct ChainMeta {
    pub network_name: &'static str,
    pub family: ChainFamily,
    pub native_symbol: &'static str,
    pub is_l2: bool,
    /// Default `gas_max_gwei_<chain>` for EVM L1 chains (ignored for L2s/non-EVM).
    pub default_gas_max_gwei: Option<u64>,
}

/// Table of well-known networks. Namespaced the same way `ChainId` is, so a `ChainId`
/// parsed from a signal or config value can look itself up here for gas-gating and
/// display metadata.
pub static KNOWN_CHAINS: &[(&str, ChainMeta)] = &[
    (
        "eip155:1",
        ChainMeta {
            network_name: "ethereum",
            family: ChainFamily::Evm,
            native_symbol: "ETH",
            is_l2: false,
            default_gas_max_gwei: Some(30),
        },
    ),
    (
        "eip155:56",
        ChainMeta {
            network_name: "bsc",
            family: ChainFamily::Evm,
            native_symbol: "BNB",
            is_l2: false,
            default_gas_max_gwei: Some(5),
        },
    ),
    (
        "eip155:42161",
        ChainMeta {
            network_name: "arbitrum",
            family: ChainFamily::Evm,
            native_symbol: "ETH",
            is_l2: true,
            default_gas_max_gwei: None,
        },
    ),
    (
        "eip155:10",
        ChainMeta {
            network_name: "optimism",
            family: ChainFamily::Evm,
            native_symbol: "ETH",
            is_l2: true,
            default_gas_max_gwei: None,
        },
    ),
    (
        "eip155:8453",
        ChainMeta {
            network_name: "base",
            family: ChainFamily::Evm,
            native_symbol: "ETH",
            is_l2: true,
            default_gas_max_gwei: None,
        },
    ),
    (
        "eip155:137",
        ChainMeta {
            network_name: "polygon",
            family: ChainFamily::Evm,
            native_symbol: "MATIC",
            is_l2: true,
            default_gas_max_gwei: None,
        },
    ),
    (
        "solana:mainnet",
        ChainMeta {
            network_name: "solana",
            family: ChainFamily::Solana,
            native_symbol: "SOL",
            is_l2: false,
            default_gas_max_gwei: None,
        },
    ),
    (
        "aptos:1",
        ChainMeta {
            network_name: "aptos",
            family: ChainFamily::Aptos,
            native_symbol: "APT",
            is_l2: false,
            default_gas_max_gwei: None,
        },
    ),
    (
        "sui:mainnet",
        ChainMeta {
            network_name: "sui",
            family: ChainFamily::Sui,
            native_symbol: "SUI",
            is_l2: false,
            default_gas_max_gwei: None,
        },
    ),
];

/// Looks up static metadata for a chain ID. `None` for chains not in the known table
/// (custom/private deployments still work, they just don't get gas-gating defaults).
pub fn chain_meta(chain_id: &ChainId) -> Option<ChainMeta> {
    KNOWN_CHAINS
        .iter()
        .find(|(k, _)| *k == chain_id.to_string())
        .map(|(_, meta)| *meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_l2s_skip_gas_gating_by_default() {
        let arbitrum = chain_meta(&ChainId::new("eip155", "42161")).unwrap();
        assert!(arbitrum.is_l2);
        assert!(arbitrum.default_gas_max_gwei.is_none());

        let ethereum = chain_meta(&ChainId::new("eip155", "1")).unwrap();
        assert!(!ethereum.is_l2);
        assert_eq!(ethereum.default_gas_max_gwei, Some(30));
    }

    #[test]
    fn unknown_chain_has_no_meta() {
        assert!(chain_meta(&ChainId::new("eip155", "999999")).is_none());
    }
}
