//! The persistence seam: five narrow traits, one per table, rather than one "God"
//! repository trait. Each table's consistency requirement differs (the `TxRecord`
//! table needs an atomic "insert if absent" for idempotency; `SystemConfig` needs
//! only last-write-wins), so each gets its own trait instead of a single interface
//! with methods that don't apply uniformly.

use async_trait::async_trait;
use orch_types::config::SystemConfig;
use orch_types::error::AuditSeverity;
use orch_types::pending_signature::PendingSignature;
use orch_types::position::Position;
use orch_types::record::TxRecord;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("a record for ({signal_id}, {step_index}) already exists")]
    DuplicateTxRecord { signal_id: String, step_index: u32 },
    #[error("not found")]
    NotFound,
    #[error("backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait PositionStore: Send + Sync {
    async fn get(&self, position_id: &str) -> Result<Option<Position>, StoreError>;
    async fn upsert(&self, position: Position) -> Result<(), StoreError>;
    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Position>, StoreError>;
}

#[async_trait]
pub trait TxRecordStore: Send + Sync {
    /// Fails with `DuplicateTxRecord` if a record for this `(signal_id, step_index)`
    /// already exists — the idempotency boundary every redelivered signal runs into.
    async fn insert_if_absent(&self, record: TxRecord) -> Result<(), StoreError>;
    async fn update(&self, record: TxRecord) -> Result<(), StoreError>;
    async fn get(&self, signal_id: &str, step_index: u32) -> Result<Option<TxRecord>, StoreError>;
    async fn list_for_signal(&self, signal_id: &str) -> Result<Vec<TxRecord>, StoreError>;
}

#[async_trait]
pub trait PendingSignatureStore: Send + Sync {
    async fn put(&self, pending: PendingSignature) -> Result<(), StoreError>;
    async fn get(&self, signal_id: &str, step_index: u32) -> Result<Option<PendingSignature>, StoreError>;
    async fn list_pending(&self) -> Result<Vec<PendingSignature>, StoreError>;
}

/// An append-only record of a policy-gate or executor decision, for the trail an
/// operator reviews after a kill-switch engagement or a rejected signal.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub signal_id: String,
    /// e.g. `"policy_rejection"`, `"step_confirmed"`, `"gas_gate_timeout"`.
    pub event_type: String,
    pub severity: AuditSeverity,
    /// Component that raised the entry, e.g. `"policy_gate"`, `"tx_executor"`.
    pub source: String,
    pub message: String,
    pub at_ms: i64,
}

#[async_trait]
pub trait AuditLogStore: Send + Sync {
    async fn append(&self, entry: AuditEntry) -> Result<(), StoreError>;
    async fn list_for_signal(&self, signal_id: &str) -> Result<Vec<AuditEntry>, StoreError>;
}

#[async_trait]
pub trait SystemConfigStore: Send + Sync {
    async fn load(&self) -> Result<SystemConfig, StoreError>;
    async fn save(&self, config: SystemConfig) -> Result<(), StoreError>;
}
