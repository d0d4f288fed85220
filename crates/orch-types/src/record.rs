//! Durable records of a submitted (or attempted) transaction, one per [`crate::plan::Step`].

use crate::chain::ChainId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxStatus {
    Pending,
    Simulating,
    Submitted,
    Confirmed,
    Failed,
    Rejected,
}

impl TxStatus {
    /// Terminal statuses never transition further; the executor stops retrying.
    pub fn is_terminal(self) -> bool {
        matches!(self, TxStatus::Confirmed | TxStatus::Failed | TxStatus::Rejected)
    }
}

/// The durable row keyed on `(signal_id, step_index)`, unique so a redelivered signal
/// or a crash-and-resume never resubmits a step already recorded as submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxRecord {
    pub signal_id: String,
    pub step_index: u32,
    pub chain_id: ChainId,
    pub status: TxStatus,
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub nonce: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
    pub updated_at_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_confirmed_failed_rejected_are_terminal() {
        assert!(!TxStatus::Pending.is_terminal());
        assert!(!TxStatus::Simulating.is_terminal());
        assert!(!TxStatus::Submitted.is_terminal());
        assert!(TxStatus::Confirmed.is_terminal());
        assert!(TxStatus::Failed.is_terminal());
        assert!(TxStatus::Rejected.is_terminal());
    }
}
