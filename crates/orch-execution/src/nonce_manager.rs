//! Cross-chain nonce accounting.
//!
//! The teacher's EVM provider delegates nonce-filling entirely to `alloy`'s
//! `NonceFiller`. That works when every chain family is EVM; here the execution
//! pipeline has to hand out nonces (or nonce-equivalents: Solana has none, Aptos has
//! sequence numbers) across families, so nonce issuance is explicit and hand-rolled
//! instead of delegated to a single chain library.
//!
//! Each `(chain_id, address)` gets its own `Mutex<u64>` cache entry. A cache miss or
//! an on-chain rejection triggers a reseed from the chain via [`NonceSource`].

use async_trait::async_trait;
use dashmap::DashMap;
use orch_types::chain::ChainId;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum NonceError {
    #[error("failed to fetch the on-chain nonce for ({0}, {1}): {2}")]
    SourceUnavailable(ChainId, String, String),
}

/// Fetches the authoritative next-nonce value from the chain itself. Implemented per
/// chain family by whatever RPC client the executor is wired with; kept generic here
/// so the nonce manager has no chain-specific dependency.
#[async_trait]
pub trait NonceSource: Send + Sync {
    async fn fetch_next_nonce(&self, chain_id: &ChainId, address: &str) -> Result<u64, NonceError>;
}

type CacheKey = (ChainId, String);

/// A `DashMap`-backed cache of per-`(chain, address)` nonce counters, each guarded by
/// its own async mutex so concurrent steps against the same signer serialize instead
/// of racing, while steps against different signers never contend.
pub struct NonceManager<S: NonceSource> {
    source: S,
    cache: DashMap<CacheKey, Arc<Mutex<Option<u64>>>>,
}

impl<S: NonceSource> NonceManager<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: DashMap::new(),
        }
    }

    fn slot(&self, chain_id: &ChainId, address: &str) -> Arc<Mutex<Option<u64>>> {
        self.cache
            .entry((chain_id.clone(), address.to_string()))
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Hands out the next nonce to use, seeding the cache from the chain on first
    /// use. Monotonically increasing per `(chain, address)` for the lifetime of the
    /// process as long as `reset` is not called in between (property P1).
    pub async fn next_nonce(&self, chain_id: &ChainId, address: &str) -> Result<u64, NonceError> {
        let slot = self.slot(chain_id, address);
        let mut guard = slot.lock().await;
        let next = match *guard {
            Some(current) => current + 1,
            None => self.source.fetch_next_nonce(chain_id, address).await?,
        };
        *guard = Some(next);
        Ok(next)
    }

    /// Drops the cached value for `(chain, address)`, forcing the next `next_nonce`
    /// call to reseed from the chain. Called by the executor when a submission fails
    /// with a nonce-mismatch error, since the cache may be stale relative to another
    /// process (or a manually broadcast transaction) using the same signer.
    pub async fn reset(&self, chain_id: &ChainId, address: &str) {
        let slot = self.slot(chain_id, address);
        let mut guard = slot.lock().await;
        *guard = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct FixedSource(AtomicU64);

    #[async_trait]
    impl NonceSource for FixedSource {
        async fn fetch_next_nonce(&self, _chain_id: &ChainId, _address: &str) -> Result<u64, NonceError> {
            Ok(self.0.load(Ordering::SeqCst))
        }
    }

    #[tokio::test]
    async fn nonces_increase_monotonically_until_reset() {
        let manager = NonceManager::new(FixedSource(AtomicU64::new(5)));
        let chain = ChainId::new("eip155", "1");

        let first = manager.next_nonce(&chain, "0xowner").await.unwrap();
        let second = manager.next_nonce(&chain, "0xowner").await.unwrap();
        let third = manager.next_nonce(&chain, "0xowner").await.unwrap();
        assert_eq!((first, second, third), (5, 6, 7));

        manager.reset(&chain, "0xowner").await;
        let after_reset = manager.next_nonce(&chain, "0xowner").await.unwrap();
        assert_eq!(after_reset, 5);
    }

    #[tokio::test]
    async fn separate_signers_do_not_share_a_counter() {
        let manager = NonceManager::new(FixedSource(AtomicU64::new(0)));
        let chain = ChainId::new("eip155", "1");

        let owner_a = manager.next_nonce(&chain, "0xA").await.unwrap();
        let owner_b = manager.next_nonce(&chain, "0xB").await.unwrap();
        assert_eq!(owner_a, 0);
        assert_eq!(owner_b, 0);
    }

    proptest! {
        /// P1: for any sequence of `next_nonce` calls against one signer with no
        /// `reset` in between, the returned values are strictly increasing.
        #[test]
        fn next_nonce_is_strictly_increasing(call_count in 1usize..50) {
            let nonces = tokio::runtime::Runtime::new().unwrap().block_on(async {
                let manager = NonceManager::new(FixedSource(AtomicU64::new(0)));
                let chain = ChainId::new("eip155", "1");
                let mut collected = Vec::with_capacity(call_count);
                for _ in 0..call_count {
                    collected.push(manager.next_nonce(&chain, "0xowner").await.unwrap());
                }
                collected
            });
            for pair in nonces.windows(2) {
                prop_assert!(pair[1] > pair[0]);
            }
        }
    }
}
