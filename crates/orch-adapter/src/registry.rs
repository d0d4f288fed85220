//! Lookup of configured protocol adapters by `(protocol_id, chain)`.

use crate::traits::ProtocolAdapter;
use orch_types::chain::ChainFamily;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
#[error("no adapter registered for protocol '{protocol_id}' on {chain_family:?}")]
pub struct AdapterNotFound {
    pub protocol_id: String,
    pub chain_family: ChainFamily,
}

/// Adapters are keyed on `(protocol_id, chain_family)` rather than `protocol_id`
/// alone, since the same protocol name can exist on more than one chain family with
/// entirely different on-chain encodings (e.g. a DEX deployed on both EVM and Solana).
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<(String, ChainFamily), Arc<dyn ProtocolAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn ProtocolAdapter>) {
        let key = (adapter.protocol_id().to_string(), adapter.chain_family());
        self.adapters.insert(key, adapter);
    }

    pub fn get(
        &self,
        protocol_id: &str,
        chain_family: ChainFamily,
    ) -> Result<Arc<dyn ProtocolAdapter>, AdapterNotFound> {
        self.adapters
            .get(&(protocol_id.to_string(), chain_family))
            .cloned()
            .ok_or_else(|| AdapterNotFound {
                protocol_id: protocol_id.to_string(),
                chain_family,
            })
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
