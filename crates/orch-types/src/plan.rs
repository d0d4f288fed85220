//! Execution plans: the ordered, dependency-annotated steps an [`crate::signal::Action`]
//! expands into.

use crate::chain::ChainId;
use crate::payload::TxPayload;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The kind of on-chain operation a [`Step`] performs. Multiple steps of different
/// kinds may be required to realize one signal (e.g. `Enter` on a fresh wallet:
/// `WRAP` then `APPROVE` then `DEPOSIT`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepKind {
    Wrap,
    Approve,
    Swap,
    Deposit,
    Withdraw,
    Harvest,
    Compound,
    BridgeLock,
    BridgeClaim,
}

/// Position of a step within its plan, used to express `depends_on` edges and as
/// half of the `(signal_id, step_index)` idempotency key.
pub type StepIndex = u32;

/// One on-chain operation within a [`Plan`].
///
/// `depends_on` steps must reach `Confirmed` before this step may be submitted; the
/// executor walks the plan in dependency order, not necessarily index order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub index: StepIndex,
    pub kind: StepKind,
    pub chain_id: ChainId,
    /// Dollar value of this step, for policy caps and audit entries. Zero for steps
    /// (e.g. `APPROVE`) that move no value themselves.
    pub usd_value: Decimal,
    /// The planner's pre-slippage expected output for a value-moving step, in the
    /// same USD-notional terms as `usd_value`. Compared against the simulator's
    /// `estimated_amount_out` by `TxExecutor` before submission; `None` for steps
    /// with nothing to quote (`APPROVE`, `WRAP`, ...).
    #[serde(default)]
    pub quoted_amount_out: Option<Decimal>,
    #[serde(default)]
    pub depends_on: Vec<StepIndex>,
    /// `None` until the protocol adapter has encoded the call.
    #[serde(default)]
    pub payload: Option<TxPayload>,
}

/// The fully expanded, dependency-ordered set of steps a signal requires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub signal_id: String,
    pub steps: Vec<Step>,
}

impl Plan {
    /// Steps whose dependencies have all reached the given set of completed indices.
    /// Used by the dispatcher to find the next batch of submittable steps.
    pub fn ready_steps(&self, completed: &[StepIndex]) -> Vec<&Step> {
        self.steps
            .iter()
            .filter(|step| !completed.contains(&step.index))
            .filter(|step| step.depends_on.iter().all(|dep| completed.contains(dep)))
            .collect()
    }
}
