//! Wallet custody, nonce management, gas scheduling, swap routing, and per-step
//! transaction execution — everything between a planned [`orch_types::plan::Step`]
//! and a confirmed transaction.

pub mod fund_preparer;
pub mod gas_scheduler;
pub mod intent_router;
pub mod key_vault;
pub mod nonce_manager;
pub mod tx_executor;
pub mod tx_simulator;
