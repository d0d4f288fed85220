//! The kill-switch / caps / whitelist gate every signal passes through before a
//! [`crate::execution_planner::ExecutionPlanner`] ever expands it into a plan.
//!
//! Every rule reads from one immutable [`SystemConfig`] snapshot plus a handful of
//! values the caller supplies (today's running volume, the target pool's health
//! score) — the gate itself holds no state and makes no RPC or store call, so it is
//! trivially unit-testable and safe to call from any worker without synchronization.

use orch_types::config::SystemConfig;
use orch_types::signal::{Action, Signal};
use rust_decimal::Decimal;

/// Extra facts the gate needs beyond the signal and the config snapshot. Assembled
/// by the dispatcher from the store/adapter before calling [`PolicyGate::evaluate`].
#[derive(Debug, Clone, Copy)]
pub struct PolicyContext {
    /// Sum of confirmed + pending `amountUsd` for this owner over the trailing 24h,
    /// not including the signal being evaluated.
    pub trailing_24h_volume_usd: Decimal,
    /// The target pool's health score, if known. Required for `Enter`; ignored
    /// otherwise.
    pub target_pool_health_score: Option<Decimal>,
    /// The aggregator/route the planner intends to use for a swap leg, if any.
    pub intended_aggregator: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyRejection {
    #[error("kill switch engaged: only exit signals are accepted")]
    KillSwitch,
    #[error("autopilot disabled: only manual_* strategies are accepted")]
    AutopilotDisabled,
    #[error("amount {amount_usd} exceeds max_single_tx_usd {max_usd}")]
    SingleTxCapExceeded { amount_usd: Decimal, max_usd: Decimal },
    #[error("24h volume {projected} would exceed max_daily_tx_usd {max_usd}")]
    DailyCapExceeded { projected: Decimal, max_usd: Decimal },
    #[error("target pool health score {score} is below min_health_score {min}")]
    HealthScoreTooLow { score: Decimal, min: Decimal },
    #[error("aggregator {aggregator} is not on the swap whitelist")]
    AggregatorNotWhitelisted { aggregator: String },
}

pub struct PolicyGate;

impl PolicyGate {
    /// Evaluates `signal` against `config` and `context`. `Ok(())` means the signal
    /// may proceed to planning; `Err` carries the first rule that rejected it (rules
    /// are checked in the order they appear in `spec.md` §4.11's table).
    pub fn evaluate(signal: &Signal, config: &SystemConfig, context: &PolicyContext) -> Result<(), PolicyRejection> {
        if config.kill_switch && signal.action != Action::Exit {
            return Err(PolicyRejection::KillSwitch);
        }

        if !config.autopilot_enabled && !signal.is_manual() {
            return Err(PolicyRejection::AutopilotDisabled);
        }

        if let Some(amount_usd) = signal.amount_usd {
            if amount_usd > config.max_single_tx_usd {
                return Err(PolicyRejection::SingleTxCapExceeded {
                    amount_usd,
                    max_usd: config.max_single_tx_usd,
                });
            }

            let projected = context.trailing_24h_volume_usd + amount_usd;
            if projected >= config.max_daily_tx_usd {
                return Err(PolicyRejection::DailyCapExceeded {
                    projected,
                    max_usd: config.max_daily_tx_usd,
                });
            }
        }

        if signal.action == Action::Enter {
            if let Some(score) = context.target_pool_health_score {
                if score < config.min_health_score {
                    return Err(PolicyRejection::HealthScoreTooLow {
                        score,
                        min: config.min_health_score,
                    });
                }
            }
        }

        if let Some(aggregator) = context.intended_aggregator {
            if !config.swap_aggregator_whitelist.is_empty() && !config.swap_aggregator_whitelist.iter().any(|a| a == aggregator)
            {
                return Err(PolicyRejection::AggregatorNotWhitelisted {
                    aggregator: aggregator.to_string(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orch_types::chain::ChainId;

    fn base_signal(action: Action, amount_usd: Option<Decimal>) -> Signal {
        Signal {
            signal_id: "sig-1".into(),
            strategy_id: "momentum-v2".into(),
            chain_id: ChainId::new("eip155", "42161"),
            protocol_id: "aave-v3".into(),
            action,
            position_id: None,
            amount_usd,
            owner: "0xowner".into(),
            max_slippage_bps: None,
            urgency: orch_types::signal::Urgency::Normal,
            params: Default::default(),
            created_at_ms: 0,
        }
    }

    fn no_op_context() -> PolicyContext {
        PolicyContext {
            trailing_24h_volume_usd: Decimal::ZERO,
            target_pool_health_score: None,
            intended_aggregator: None,
        }
    }

    #[test]
    fn kill_switch_blocks_enter_but_not_exit() {
        let mut config = SystemConfig::default();
        config.kill_switch = true;

        let enter = base_signal(Action::Enter, Some(Decimal::new(100, 0)));
        assert_eq!(
            PolicyGate::evaluate(&enter, &config, &no_op_context()),
            Err(PolicyRejection::KillSwitch)
        );

        let exit = base_signal(Action::Exit, Some(Decimal::new(100, 0)));
        assert_eq!(PolicyGate::evaluate(&exit, &config, &no_op_context()), Ok(()));
    }

    #[test]
    fn autopilot_disabled_blocks_non_manual_strategies() {
        let mut config = SystemConfig::default();
        config.autopilot_enabled = false;

        let mut automated = base_signal(Action::Enter, Some(Decimal::new(100, 0)));
        automated.strategy_id = "momentum-v2".into();
        assert_eq!(
            PolicyGate::evaluate(&automated, &config, &no_op_context()),
            Err(PolicyRejection::AutopilotDisabled)
        );

        let mut manual = automated.clone();
        manual.strategy_id = "manual_jane".into();
        assert_eq!(PolicyGate::evaluate(&manual, &config, &no_op_context()), Ok(()));
    }

    #[test]
    fn rejects_amounts_over_the_single_tx_cap() {
        let mut config = SystemConfig::default();
        config.max_single_tx_usd = Decimal::new(1_000, 0);
        let signal = base_signal(Action::Enter, Some(Decimal::new(5_000, 0)));

        assert!(matches!(
            PolicyGate::evaluate(&signal, &config, &no_op_context()),
            Err(PolicyRejection::SingleTxCapExceeded { .. })
        ));
    }

    #[test]
    fn rejects_when_trailing_volume_plus_signal_would_meet_the_daily_cap() {
        let mut config = SystemConfig::default();
        config.max_single_tx_usd = Decimal::new(1_000_000, 0);
        config.max_daily_tx_usd = Decimal::new(10_000, 0);
        let signal = base_signal(Action::Enter, Some(Decimal::new(1_000, 0)));
        let context = PolicyContext {
            trailing_24h_volume_usd: Decimal::new(9_500, 0),
            ..no_op_context()
        };

        assert!(matches!(
            PolicyGate::evaluate(&signal, &config, &context),
            Err(PolicyRejection::DailyCapExceeded { .. })
        ));
    }

    #[test]
    fn rejects_entering_a_pool_below_the_minimum_health_score() {
        let mut config = SystemConfig::default();
        config.min_health_score = Decimal::new(50, 0);
        let signal = base_signal(Action::Enter, Some(Decimal::new(100, 0)));
        let context = PolicyContext {
            target_pool_health_score: Some(Decimal::new(20, 0)),
            ..no_op_context()
        };

        assert_eq!(
            PolicyGate::evaluate(&signal, &config, &context),
            Err(PolicyRejection::HealthScoreTooLow {
                score: Decimal::new(20, 0),
                min: Decimal::new(50, 0)
            })
        );
    }

    #[test]
    fn health_score_gate_does_not_apply_to_exit() {
        let mut config = SystemConfig::default();
        config.min_health_score = Decimal::new(50, 0);
        let signal = base_signal(Action::Exit, Some(Decimal::new(100, 0)));
        let context = PolicyContext {
            target_pool_health_score: Some(Decimal::ZERO),
            ..no_op_context()
        };

        assert_eq!(PolicyGate::evaluate(&signal, &config, &context), Ok(()));
    }

    #[test]
    fn rejects_a_non_whitelisted_aggregator_only_when_a_whitelist_is_set() {
        let mut config = SystemConfig::default();
        config.swap_aggregator_whitelist = vec!["cow_protocol".into(), "1inch_fusion".into()];
        let signal = base_signal(Action::Enter, Some(Decimal::new(100, 0)));
        let context = PolicyContext {
            intended_aggregator: Some("uniswapx"),
            ..no_op_context()
        };

        assert!(matches!(
            PolicyGate::evaluate(&signal, &config, &context),
            Err(PolicyRejection::AggregatorNotWhitelisted { .. })
        ));

        let empty_whitelist_config = SystemConfig::default();
        assert_eq!(PolicyGate::evaluate(&signal, &empty_whitelist_config, &context), Ok(()));
    }
}
