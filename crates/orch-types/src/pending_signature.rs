//! The bridge between steps that require an offline/cold signer and the
//! execution pipeline's otherwise fully automated flow.

use crate::chain::ChainId;
use crate::payload::TxPayload;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingSignatureStatus {
    Pending,
    Broadcasted,
    Rejected,
    Expired,
}

/// A step handed off to an external signer because no hot key is loaded for its
/// `(chain_id, owner)`. The bridge polls for a signature or a TTL expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSignature {
    pub signal_id: String,
    pub step_index: u32,
    pub chain_id: ChainId,
    pub owner: String,
    pub payload: TxPayload,
    pub status: PendingSignatureStatus,
    pub created_at_ms: i64,
    pub expires_at_ms: i64,
    #[serde(default)]
    pub signed_tx: Option<String>,
}

impl PendingSignature {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.status == PendingSignatureStatus::Pending && now_ms >= self.expires_at_ms
    }
}
