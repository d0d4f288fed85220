//! Builds the [`StepFunding`] map an [`ExecutionPlanner`] needs from a raw
//! [`Signal`], reading protocol call arguments straight out of `signal.params`.
//!
//! A real deployment would query the funding wallet's on-chain balance and
//! allowance before deciding a wrap/approve prelude (`FundPreparer`); until a live
//! RPC-backed `TxSimulator`/`ChainSubmitter` pair exists (see `DESIGN.md`), this
//! assumes the wallet is already funded and approved and skips straight to the
//! protocol's own step.

use orch_execution::fund_preparer::FundingSnapshot;
use orch_dispatch::StepFunding;
use orch_types::plan::StepKind;
use orch_types::signal::{Action, Signal};
use rust_decimal::Decimal;
use std::collections::HashMap;

fn param_str(signal: &Signal, key: &str) -> String {
    signal.params.get(key).and_then(|v| v.as_str()).unwrap_or_default().to_string()
}

fn already_funded(required: Decimal) -> FundingSnapshot {
    FundingSnapshot {
        native_balance: Decimal::ZERO,
        wrapped_balance: required,
        current_allowance: required,
        required_amount: required,
    }
}

/// `amount_usd` stands in for the token-denominated amount the adapter expects;
/// a real deployment would convert through the asset's on-chain decimals.
fn amount_for(signal: &Signal) -> Decimal {
    signal.amount_usd.unwrap_or(Decimal::ZERO)
}

pub fn resolve(signal: &Signal) -> HashMap<StepKind, StepFunding> {
    let mut funding = HashMap::new();
    let amount = amount_for(signal);

    match signal.action {
        Action::Enter | Action::Increase => {
            funding.insert(
                StepKind::Deposit,
                StepFunding {
                    snapshot: already_funded(amount),
                    args: serde_json::json!({
                        "pool": param_str(signal, "pool"),
                        "asset": param_str(signal, "asset"),
                        "amount": amount.to_string(),
                        "on_behalf_of": signal.owner,
                    }),
                },
            );
        }
        Action::Exit | Action::Decrease => {
            funding.insert(
                StepKind::Withdraw,
                StepFunding {
                    snapshot: already_funded(amount),
                    args: serde_json::json!({
                        "pool": param_str(signal, "pool"),
                        "asset": param_str(signal, "asset"),
                        "amount": amount.to_string(),
                        "to": signal.owner,
                    }),
                },
            );
        }
        Action::Compound => {
            funding.insert(
                StepKind::Harvest,
                StepFunding {
                    snapshot: already_funded(Decimal::ZERO),
                    args: serde_json::json!({
                        "pool": param_str(signal, "pool"),
                    }),
                },
            );
            funding.insert(
                StepKind::Deposit,
                StepFunding {
                    snapshot: already_funded(amount),
                    args: serde_json::json!({
                        "pool": param_str(signal, "pool"),
                        "asset": param_str(signal, "asset"),
                        "amount": amount.to_string(),
                        "on_behalf_of": signal.owner,
                    }),
                },
            );
        }
        Action::Rebalance => {
            funding.insert(
                StepKind::Withdraw,
                StepFunding {
                    snapshot: already_funded(amount),
                    args: serde_json::json!({
                        "pool": param_str(signal, "pool"),
                        "asset": param_str(signal, "asset"),
                        "amount": amount.to_string(),
                        "to": signal.owner,
                    }),
                },
            );
            funding.insert(
                StepKind::Deposit,
                StepFunding {
                    snapshot: already_funded(amount),
                    args: serde_json::json!({
                        "pool": param_str(signal, "targetPoolId"),
                        "asset": param_str(signal, "asset"),
                        "amount": amount.to_string(),
                        "on_behalf_of": signal.owner,
                    }),
                },
            );
        }
    }

    funding
}

#[cfg(test)]
mod tests {
    use super::*;
    use orch_types::chain::ChainId;

    fn base_signal(action: Action) -> Signal {
        Signal {
            signal_id: "sig-1".into(),
            strategy_id: "momentum-v2".into(),
            chain_id: ChainId::new("eip155", "42161"),
            protocol_id: "aave-v3".into(),
            action,
            position_id: None,
            amount_usd: Some(Decimal::new(1_000, 0)),
            owner: "0xowner".into(),
            max_slippage_bps: None,
            urgency: orch_types::signal::Urgency::Normal,
            params: Default::default(),
            created_at_ms: 0,
        }
    }

    #[test]
    fn enter_resolves_a_fully_funded_deposit_entry() {
        let funding = resolve(&base_signal(Action::Enter));
        let deposit = funding.get(&StepKind::Deposit).unwrap();
        assert_eq!(deposit.snapshot.required_amount, Decimal::new(1_000, 0));
        assert_eq!(deposit.snapshot.current_allowance, deposit.snapshot.required_amount);
    }

    #[test]
    fn exit_resolves_a_withdraw_entry_not_a_deposit() {
        let funding = resolve(&base_signal(Action::Exit));
        assert!(funding.contains_key(&StepKind::Withdraw));
        assert!(!funding.contains_key(&StepKind::Deposit));
    }
}
