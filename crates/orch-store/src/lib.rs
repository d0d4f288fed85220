//! Persistence and queueing abstractions: narrow traits per table/concern plus
//! in-memory reference implementations, so the rest of the workspace is wired
//! against trait objects rather than a concrete database from the start.

pub mod memory_queue;
pub mod memory_store;
pub mod queue;
pub mod store;

pub use memory_queue::InMemorySignalQueue;
pub use memory_store::InMemoryStore;
pub use queue::{DeliveryHandle, QueueError, SignalQueue};
pub use store::{AuditEntry, AuditLogStore, PendingSignatureStore, PositionStore, StoreError, SystemConfigStore, TxRecordStore};
