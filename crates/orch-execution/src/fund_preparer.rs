//! Decides the wrap/approve prelude a step needs before its main operation can run.
//!
//! A deposit into an EVM protocol needs an `APPROVE` first if the spender's current
//! allowance is insufficient; a native-asset deposit into a protocol that only
//! accepts the wrapped token needs a `WRAP` first. Both are plan-time decisions made
//! from a balance/allowance snapshot, not from touching the chain directly — the
//! snapshot is supplied by whatever already queried it (the simulator or planner).

use orch_types::plan::StepKind;
use rust_decimal::Decimal;

/// What the fund preparer observed about the funding wallet before a step runs.
#[derive(Debug, Clone, Copy)]
pub struct FundingSnapshot {
    pub native_balance: Decimal,
    pub wrapped_balance: Decimal,
    pub current_allowance: Decimal,
    pub required_amount: Decimal,
}

pub struct FundPreparer;

impl FundPreparer {
    /// Extra steps (in the order they must run) to prepend before `kind` so the
    /// wallet is funded and approved for it. Empty if nothing is needed.
    pub fn prelude_for(kind: StepKind, snapshot: &FundingSnapshot) -> Vec<StepKind> {
        let mut prelude = Vec::new();

        let needs_wrap = matches!(kind, StepKind::Deposit | StepKind::Swap)
            && snapshot.wrapped_balance < snapshot.required_amount
            && snapshot.native_balance >= snapshot.required_amount - snapshot.wrapped_balance;
        if needs_wrap {
            prelude.push(StepKind::Wrap);
        }

        let needs_approve =
            matches!(kind, StepKind::Deposit | StepKind::Swap) && snapshot.current_allowance < snapshot.required_amount;
        if needs_approve {
            prelude.push(StepKind::Approve);
        }

        prelude
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_nothing_when_already_funded_and_approved() {
        let snapshot = FundingSnapshot {
            native_balance: Decimal::ZERO,
            wrapped_balance: Decimal::new(100, 0),
            current_allowance: Decimal::new(100, 0),
            required_amount: Decimal::new(50, 0),
        };
        assert!(FundPreparer::prelude_for(StepKind::Deposit, &snapshot).is_empty());
    }

    #[test]
    fn wraps_native_balance_before_depositing_when_wrapped_balance_is_short() {
        let snapshot = FundingSnapshot {
            native_balance: Decimal::new(100, 0),
            wrapped_balance: Decimal::ZERO,
            current_allowance: Decimal::new(100, 0),
            required_amount: Decimal::new(50, 0),
        };
        let prelude = FundPreparer::prelude_for(StepKind::Deposit, &snapshot);
        assert_eq!(prelude, vec![StepKind::Wrap]);
    }

    #[test]
    fn approves_when_allowance_is_insufficient() {
        let snapshot = FundingSnapshot {
            native_balance: Decimal::ZERO,
            wrapped_balance: Decimal::new(100, 0),
            current_allowance: Decimal::new(10, 0),
            required_amount: Decimal::new(50, 0),
        };
        let prelude = FundPreparer::prelude_for(StepKind::Deposit, &snapshot);
        assert_eq!(prelude, vec![StepKind::Approve]);
    }

    #[test]
    fn withdraw_never_needs_a_wrap_or_approve_prelude() {
        let snapshot = FundingSnapshot {
            native_balance: Decimal::ZERO,
            wrapped_balance: Decimal::ZERO,
            current_allowance: Decimal::ZERO,
            required_amount: Decimal::new(50, 0),
        };
        assert!(FundPreparer::prelude_for(StepKind::Withdraw, &snapshot).is_empty());
    }
}
