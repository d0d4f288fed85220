//! Signal dispatch: policy gating, execution planning, gas gating, non-custodial
//! signature handoff, position bookkeeping, and the per-chain worker loop that ties
//! them together.

pub mod dispatcher;
pub mod execution_planner;
pub mod gas_queue;
pub mod pending_signature_bridge;
pub mod policy_gate;
pub mod position_ledger;

pub use dispatcher::{run_chain_worker, DispatchError, DispatchOutcome, SignalDispatcher};
pub use execution_planner::{ExecutionPlanner, PlanError, PlanRequest, StepFunding};
pub use gas_queue::{GasPriceSource, GasQueue, Released};
pub use pending_signature_bridge::{BridgeError, PendingSignatureBridge, DEFAULT_TTL_MS};
pub use policy_gate::{PolicyContext, PolicyGate, PolicyRejection};
pub use position_ledger::{BalanceSource, LedgerError, PositionLedger, PositionReconciler, PositionSnapshot};
