//! Non-custodial mode (`spec.md` §4.12): when no hot key is loaded for a step's
//! `(chain, owner)`, the executor hands the payload off here instead of signing it
//! itself. A `PendingSignature` row sits in the store until an external signer
//! reports back (`broadcasted`/`rejected`) or its 30-minute TTL lapses, at which
//! point it auto-expires.

use orch_store::store::{PendingSignatureStore, StoreError};
use orch_types::chain::ChainId;
use orch_types::payload::TxPayload;
use orch_types::pending_signature::{PendingSignature, PendingSignatureStatus};

/// Default time-to-live for a signature request before it auto-expires.
pub const DEFAULT_TTL_MS: i64 = 30 * 60 * 1000;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no pending signature for ({signal_id}, {step_index})")]
    NotFound { signal_id: String, step_index: u32 },
    #[error("pending signature for ({signal_id}, {step_index}) is already {status:?}, not pending")]
    AlreadyTerminal {
        signal_id: String,
        step_index: u32,
        status: PendingSignatureStatus,
    },
}

pub struct PendingSignatureBridge;

impl PendingSignatureBridge {
    /// Serializes a step into a fresh `pending_signatures` row. The executor calls
    /// this instead of signing/submitting, then returns a `PENDING` `TxRecord`
    /// referencing `(signal_id, step_index)`.
    pub async fn request_signature(
        store: &dyn PendingSignatureStore,
        signal_id: &str,
        step_index: u32,
        chain_id: ChainId,
        owner: &str,
        payload: TxPayload,
        now_ms: i64,
    ) -> Result<PendingSignature, BridgeError> {
        let pending = PendingSignature {
            signal_id: signal_id.to_string(),
            step_index,
            chain_id,
            owner: owner.to_string(),
            payload,
            status: PendingSignatureStatus::Pending,
            created_at_ms: now_ms,
            expires_at_ms: now_ms + DEFAULT_TTL_MS,
            signed_tx: None,
        };
        store.put(pending.clone()).await?;
        Ok(pending)
    }

    /// An external signer reported a broadcast hash. Transitions `Pending` →
    /// `Broadcasted` so the executor's confirmation poll can resume.
    pub async fn report_broadcasted(
        store: &dyn PendingSignatureStore,
        signal_id: &str,
        step_index: u32,
        tx_hash: String,
    ) -> Result<PendingSignature, BridgeError> {
        let mut pending = Self::require_pending(store, signal_id, step_index).await?;
        pending.status = PendingSignatureStatus::Broadcasted;
        pending.signed_tx = Some(tx_hash);
        store.put(pending.clone()).await?;
        Ok(pending)
    }

    /// An external signer declined the request. Transitions `Pending` → `Rejected`;
    /// the caller marks the associated `TxRecord` `REJECTED` in response.
    pub async fn report_rejected(store: &dyn PendingSignatureStore, signal_id: &str, step_index: u32) -> Result<PendingSignature, BridgeError> {
        let mut pending = Self::require_pending(store, signal_id, step_index).await?;
        pending.status = PendingSignatureStatus::Rejected;
        store.put(pending.clone()).await?;
        Ok(pending)
    }

    /// Scans every still-pending row and expires the ones whose TTL has lapsed.
    /// Intended to run on the same long-lived watcher loop that polls for external
    /// broadcast/reject updates. Returns the rows just expired, so the caller can
    /// mark their `TxRecord`s `REJECTED{reason: signature_timeout}`.
    pub async fn expire_stale(store: &dyn PendingSignatureStore, now_ms: i64) -> Result<Vec<PendingSignature>, BridgeError> {
        let mut expired = Vec::new();
        for mut pending in store.list_pending().await? {
            if pending.is_expired(now_ms) {
                pending.status = PendingSignatureStatus::Expired;
                store.put(pending.clone()).await?;
                expired.push(pending);
            }
        }
        Ok(expired)
    }

    async fn require_pending(store: &dyn PendingSignatureStore, signal_id: &str, step_index: u32) -> Result<PendingSignature, BridgeError> {
        let pending = store
            .get(signal_id, step_index)
            .await?
            .ok_or_else(|| BridgeError::NotFound {
                signal_id: signal_id.to_string(),
                step_index,
            })?;
        if pending.status != PendingSignatureStatus::Pending {
            return Err(BridgeError::AlreadyTerminal {
                signal_id: signal_id.to_string(),
                step_index,
                status: pending.status,
            });
        }
        Ok(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orch_store::memory_store::InMemoryStore;
    use orch_types::payload::EvmPayload;

    fn sample_payload() -> TxPayload {
        TxPayload::Evm(EvmPayload {
            to: "0xabc".into(),
            value: "0".into(),
            data: "0x".into(),
            chain_ref: 1,
            gas_limit: None,
            max_fee_per_gas_wei: None,
            max_priority_fee_per_gas_wei: None,
        })
    }

    #[tokio::test]
    async fn request_then_report_broadcasted_round_trips() {
        let store = InMemoryStore::new();
        PendingSignatureBridge::request_signature(&store, "sig-1", 0, ChainId::new("eip155", "1"), "0xowner", sample_payload(), 1_000)
            .await
            .unwrap();

        let updated = PendingSignatureBridge::report_broadcasted(&store, "sig-1", 0, "0xtxhash".into())
            .await
            .unwrap();
        assert_eq!(updated.status, PendingSignatureStatus::Broadcasted);
        assert_eq!(updated.signed_tx.as_deref(), Some("0xtxhash"));
    }

    #[tokio::test]
    async fn report_rejected_transitions_from_pending() {
        let store = InMemoryStore::new();
        PendingSignatureBridge::request_signature(&store, "sig-1", 0, ChainId::new("eip155", "1"), "0xowner", sample_payload(), 1_000)
            .await
            .unwrap();

        let updated = PendingSignatureBridge::report_rejected(&store, "sig-1", 0).await.unwrap();
        assert_eq!(updated.status, PendingSignatureStatus::Rejected);
    }

    #[tokio::test]
    async fn cannot_report_twice_once_terminal() {
        let store = InMemoryStore::new();
        PendingSignatureBridge::request_signature(&store, "sig-1", 0, ChainId::new("eip155", "1"), "0xowner", sample_payload(), 1_000)
            .await
            .unwrap();
        PendingSignatureBridge::report_rejected(&store, "sig-1", 0).await.unwrap();

        let err = PendingSignatureBridge::report_broadcasted(&store, "sig-1", 0, "0xtxhash".into())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::AlreadyTerminal { .. }));
    }

    #[tokio::test]
    async fn expire_stale_only_touches_rows_past_their_ttl() {
        let store = InMemoryStore::new();
        PendingSignatureBridge::request_signature(&store, "sig-fresh", 0, ChainId::new("eip155", "1"), "0xowner", sample_payload(), 1_000)
            .await
            .unwrap();
        PendingSignatureBridge::request_signature(&store, "sig-stale", 0, ChainId::new("eip155", "1"), "0xowner", sample_payload(), 1_000)
            .await
            .unwrap();

        let expired = PendingSignatureBridge::expire_stale(&store, 1_000 + DEFAULT_TTL_MS - 1).await.unwrap();
        assert!(expired.is_empty());

        let expired = PendingSignatureBridge::expire_stale(&store, 1_000 + DEFAULT_TTL_MS).await.unwrap();
        assert_eq!(expired.len(), 2);
        assert!(expired.iter().all(|p| p.status == PendingSignatureStatus::Expired));
    }

    #[tokio::test]
    async fn reporting_on_an_unknown_signature_errors() {
        let store = InMemoryStore::new();
        let err = PendingSignatureBridge::report_broadcasted(&store, "missing", 0, "0xtxhash".into())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::NotFound { .. }));
    }
}
