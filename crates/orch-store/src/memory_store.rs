//! An in-memory reference implementation of the [`crate::store`] trait family, backed
//! by [`dashmap`] for lock-free concurrent access. Intended for tests and local
//! development; a production deployment swaps in a durable implementation against
//! the same traits without touching callers.

use crate::store::{AuditEntry, AuditLogStore, PendingSignatureStore, PositionStore, StoreError, SystemConfigStore, TxRecordStore};
use async_trait::async_trait;
use dashmap::DashMap;
use orch_types::config::SystemConfig;
use orch_types::pending_signature::PendingSignature;
use orch_types::position::Position;
use orch_types::record::TxRecord;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryStore {
    positions: DashMap<String, Position>,
    tx_records: DashMap<(String, u32), TxRecord>,
    pending_signatures: DashMap<(String, u32), PendingSignature>,
    audit_log: DashMap<String, Vec<AuditEntry>>,
    system_config: RwLock<SystemConfig>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PositionStore for InMemoryStore {
    async fn get(&self, position_id: &str) -> Result<Option<Position>, StoreError> {
        Ok(self.positions.get(position_id).map(|entry| entry.clone()))
    }

    async fn upsert(&self, position: Position) -> Result<(), StoreError> {
        self.positions.insert(position.position_id.clone(), position);
        Ok(())
    }

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Position>, StoreError> {
        Ok(self
            .positions
            .iter()
            .filter(|entry| entry.owner == owner)
            .map(|entry| entry.clone())
            .collect())
    }
}

#[async_trait]
impl TxRecordStore for InMemoryStore {
    async fn insert_if_absent(&self, record: TxRecord) -> Result<(), StoreError> {
        let key = (record.signal_id.clone(), record.step_index);
        match self.tx_records.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StoreError::DuplicateTxRecord {
                signal_id: key.0,
                step_index: key.1,
            }),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    async fn update(&self, record: TxRecord) -> Result<(), StoreError> {
        self.tx_records.insert((record.signal_id.clone(), record.step_index), record);
        Ok(())
    }

    async fn get(&self, signal_id: &str, step_index: u32) -> Result<Option<TxRecord>, StoreError> {
        Ok(self
            .tx_records
            .get(&(signal_id.to_string(), step_index))
            .map(|entry| entry.clone()))
    }

    async fn list_for_signal(&self, signal_id: &str) -> Result<Vec<TxRecord>, StoreError> {
        Ok(self
            .tx_records
            .iter()
            .filter(|entry| entry.key().0 == signal_id)
            .map(|entry| entry.clone())
            .collect())
    }
}

#[async_trait]
impl PendingSignatureStore for InMemoryStore {
    async fn put(&self, pending: PendingSignature) -> Result<(), StoreError> {
        self.pending_signatures
            .insert((pending.signal_id.clone(), pending.step_index), pending);
        Ok(())
    }

    async fn get(&self, signal_id: &str, step_index: u32) -> Result<Option<PendingSignature>, StoreError> {
        Ok(self
            .pending_signatures
            .get(&(signal_id.to_string(), step_index))
            .map(|entry| entry.clone()))
    }

    async fn list_pending(&self) -> Result<Vec<PendingSignature>, StoreError> {
        Ok(self.pending_signatures.iter().map(|entry| entry.clone()).collect())
    }
}

#[async_trait]
impl AuditLogStore for InMemoryStore {
    async fn append(&self, entry: AuditEntry) -> Result<(), StoreError> {
        self.audit_log.entry(entry.signal_id.clone()).or_default().push(entry);
        Ok(())
    }

    async fn list_for_signal(&self, signal_id: &str) -> Result<Vec<AuditEntry>, StoreError> {
        Ok(self.audit_log.get(signal_id).map(|entry| entry.clone()).unwrap_or_default())
    }
}

#[async_trait]
impl SystemConfigStore for InMemoryStore {
    async fn load(&self) -> Result<SystemConfig, StoreError> {
        Ok(self.system_config.read().await.clone())
    }

    async fn save(&self, config: SystemConfig) -> Result<(), StoreError> {
        *self.system_config.write().await = config;
        Ok(())
    }
}
