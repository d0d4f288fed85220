//! Inbound signals: the unit of work a [`crate::plan::Plan`] is built from.

use crate::chain::ChainId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What a signal asks the orchestrator to do to a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Enter,
    Exit,
    Compound,
    Rebalance,
    Increase,
    Decrease,
}

/// How strongly the advisor wants this signal executed promptly, consulted by
/// `IntentRouter` (`spec.md` §4.6) to decide between a private-relay route and the
/// public mempool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Normal,
    High,
}

impl Default for Urgency {
    fn default() -> Self {
        Urgency::Normal
    }
}

/// A single signal pulled off the [`crate::store::SignalQueue`].
///
/// `signal_id` is the idempotency key: the dispatcher and store both key on it to
/// guarantee a redelivered signal never double-executes a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub signal_id: String,
    /// Identifies the advisor strategy that emitted this signal. A `"manual_"` prefix
    /// marks it as human-originated, exempt from the `autopilot_enabled` gate.
    pub strategy_id: String,
    pub chain_id: ChainId,
    pub protocol_id: String,
    pub action: Action,
    /// The position this signal acts on; absent for `Enter`, which creates one.
    #[serde(default)]
    pub position_id: Option<String>,
    #[serde(default)]
    pub amount_usd: Option<Decimal>,
    /// Owner wallet address, chain-family-formatted.
    pub owner: String,
    #[serde(default)]
    pub max_slippage_bps: Option<u32>,
    /// Consulted by `IntentRouter`; defaults to `Normal` for signals that don't set it.
    #[serde(default)]
    pub urgency: Urgency,
    /// Action-specific arguments the planner needs beyond the common fields above,
    /// e.g. `targetPoolId`/`targetChainId` for `rebalance`. The planner validates its
    /// own shape; the signal type stays agnostic of any one action's argument set.
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
    /// Unix millis the signal was created, used for staleness checks in the policy gate.
    pub created_at_ms: i64,
}

impl Signal {
    /// `true` if this signal was placed by an operator rather than the autopilot
    /// advisor; exempt from the `autopilot_enabled` policy gate.
    pub fn is_manual(&self) -> bool {
        self.strategy_id.starts_with("manual_")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_roundtrips() {
        let signal = Signal {
            signal_id: "sig-1".into(),
            strategy_id: "momentum-v2".into(),
            chain_id: ChainId::new("eip155", "42161"),
            protocol_id: "aave-v3".into(),
            action: Action::Enter,
            position_id: None,
            amount_usd: Some(Decimal::new(10000, 2)),
            owner: "0xowner".into(),
            max_slippage_bps: Some(50),
            urgency: Urgency::High,
            params: Default::default(),
            created_at_ms: 1_700_000_000_000,
        };
        let json = serde_json::to_string(&signal).unwrap();
        let back: Signal = serde_json::from_str(&json).unwrap();
        assert_eq!(signal, back);
    }

    #[test]
    fn is_manual_checks_the_strategy_id_prefix() {
        let mut signal = Signal {
            signal_id: "sig-1".into(),
            strategy_id: "manual_operator_jane".into(),
            chain_id: ChainId::new("eip155", "42161"),
            protocol_id: "aave-v3".into(),
            action: Action::Enter,
            position_id: None,
            amount_usd: None,
            owner: "0xowner".into(),
            max_slippage_bps: None,
            urgency: Urgency::Normal,
            params: Default::default(),
            created_at_ms: 0,
        };
        assert!(signal.is_manual());

        signal.strategy_id = "momentum-v2".into();
        assert!(!signal.is_manual());
    }
}
