//! Core domain types shared by every orchestrator crate: chain identification,
//! signals, plans, transaction records, positions, and the config primitives the
//! rest of the workspace builds on.
//!
//! | Module | Contents |
//! |---|---|
//! | [`chain`] | `ChainId`/`ChainIdPattern`, `ChainRegistry`, `FromConfig` |
//! | [`signal`] | `Signal`, `Action` |
//! | [`plan`] | `Plan`, `Step`, `StepKind` |
//! | [`payload`] | `TxPayload` and its per-family variants |
//! | [`record`] | `TxRecord`, `TxStatus` |
//! | [`position`] | `Position`, `PositionStatus` |
//! | [`pending_signature`] | `PendingSignature`, `PendingSignatureStatus` |
//! | [`config`] | `SecretOrEnv`, `RpcConfig`, `SystemConfig`, `ConfigWatcher` |
//! | [`money`] | dust-threshold helpers |
//! | [`error`] | `ErrorKind`, `Classify` |

pub mod chain;
pub mod config;
pub mod error;
pub mod money;
pub mod payload;
pub mod pending_signature;
pub mod plan;
pub mod position;
pub mod record;
pub mod signal;
