//! Expands a [`Signal`] into an ordered, dependency-annotated [`Plan`] per the rules
//! in `spec.md` §4.9. The planner never signs or submits anything; it asks the
//! adapter registry to encode each step's payload and asks the fund preparer whether
//! a wrap/approve prelude is needed, then hands the whole thing to the dispatcher.
//!
//! Three step kinds never go through the signal's own `protocol_id` adapter:
//! `WRAP`/`APPROVE` are generic ERC20 operations encoded directly (see
//! [`orch_adapter::token_ops`]), and `BRIDGE_LOCK`/`BRIDGE_CLAIM` are encoded by the
//! fixed `"htlc-bridge"` adapter, since a rebalance's two legs can target two
//! different protocols entirely.

use orch_adapter::registry::AdapterRegistry;
use orch_adapter::token_ops;
use orch_adapter::traits::{AdapterCapabilities, AdapterError, StepArgs};
use orch_execution::fund_preparer::{FundPreparer, FundingSnapshot};
use orch_types::chain::ChainId;
use orch_types::plan::{Plan, Step, StepIndex, StepKind};
use orch_types::signal::{Action, Signal};
use rust_decimal::Decimal;
use std::collections::HashMap;

const HTLC_BRIDGE_PROTOCOL_ID: &str = "htlc-bridge";

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error("rebalance signal is missing params.targetPoolId")]
    MissingTargetPool,
    #[error("{action:?} requires an amount_usd")]
    MissingAmount { action: Action },
    #[error("a swap leg is needed but no swap_protocol_id was given")]
    MissingSwapProtocol,
}

/// What the planner needs to know about a step's funding before deciding its
/// wrap/approve prelude and encoding its payload. Supplied per step by the caller,
/// since only the caller (dispatcher) has live balance/allowance data.
#[derive(Debug, Clone)]
pub struct StepFunding {
    pub snapshot: FundingSnapshot,
    pub args: StepArgs,
}

/// Inputs specific to one signal's planning pass, beyond the signal itself.
pub struct PlanRequest<'a> {
    pub signal: &'a Signal,
    pub protocol_id: &'a str,
    pub chain_id: ChainId,
    /// Funding/argument context keyed by the step kind it applies to — one entry
    /// per step kind the plan will need (`Deposit`, `Swap`, `Wrap`, `Approve`, ...).
    pub funding: HashMap<StepKind, StepFunding>,
    /// For `exit`/`compound`/the exit leg of `rebalance`, whether a harvest leg is
    /// worth running. Silently dropped if the protocol doesn't advertise `HARVEST`.
    pub has_pending_rewards: bool,
    /// `true` when the rebalance's destination pool lives on a different chain,
    /// triggering the HTLC bridge leg.
    pub is_cross_chain: bool,
    /// Which adapter handles a `SWAP` step, if the plan needs one. Required
    /// whenever `funding` contains a `Swap` entry.
    pub swap_protocol_id: Option<&'a str>,
}

pub struct ExecutionPlanner;

impl ExecutionPlanner {
    pub async fn plan(registry: &AdapterRegistry, request: &PlanRequest<'_>) -> Result<Plan, PlanError> {
        let signal = request.signal;
        let mut steps = Vec::new();

        match signal.action {
            Action::Enter | Action::Increase => {
                Self::plan_enter(registry, request, &mut steps).await?;
            }
            Action::Exit | Action::Decrease => {
                Self::plan_exit(registry, request, &mut steps).await?;
            }
            Action::Compound => {
                Self::plan_compound(registry, request, &mut steps).await?;
            }
            Action::Rebalance => {
                Self::plan_rebalance(registry, request, &mut steps).await?;
            }
        }

        Ok(Plan {
            signal_id: signal.signal_id.clone(),
            steps,
        })
    }

    fn chain_family(request: &PlanRequest<'_>) -> orch_types::chain::ChainFamily {
        request.chain_id.family().unwrap_or(orch_types::chain::ChainFamily::Evm)
    }

    fn args_for(request: &PlanRequest<'_>, kind: StepKind) -> StepArgs {
        request
            .funding
            .get(&kind)
            .map(|f| f.args.clone())
            .unwrap_or(serde_json::Value::Null)
    }

    /// Encodes a step against the signal's own protocol (deposit/withdraw/harvest/
    /// compound legs on the target protocol).
    async fn encode_via_protocol(
        registry: &AdapterRegistry,
        request: &PlanRequest<'_>,
        protocol_id: &str,
        index: StepIndex,
        kind: StepKind,
        depends_on: Vec<StepIndex>,
        usd_value: Decimal,
    ) -> Result<Step, PlanError> {
        let adapter = registry.get(protocol_id, Self::chain_family(request))?;
        let args = Self::args_for(request, kind);
        let payload = adapter.encode_step(kind, &args).await?;
        Ok(Step {
            index,
            kind,
            chain_id: request.chain_id.clone(),
            usd_value,
            quoted_amount_out: if kind == StepKind::Swap && usd_value > Decimal::ZERO {
                Some(usd_value)
            } else {
                None
            },
            depends_on,
            payload: Some(payload),
        })
    }

    /// Encodes a generic `WRAP`/`APPROVE` step without going through any protocol
    /// adapter.
    fn encode_token_op(request: &PlanRequest<'_>, index: StepIndex, kind: StepKind, depends_on: Vec<StepIndex>) -> Result<Step, PlanError> {
        let args = Self::args_for(request, kind);
        let payload = match kind {
            StepKind::Wrap => token_ops::encode_wrap(&args)?,
            StepKind::Approve => token_ops::encode_approve(&args)?,
            _ => unreachable!("encode_token_op only called for WRAP/APPROVE"),
        };
        Ok(Step {
            index,
            kind,
            chain_id: request.chain_id.clone(),
            usd_value: Decimal::ZERO,
            quoted_amount_out: None,
            depends_on,
            payload: Some(payload),
        })
    }

    /// `enter`/`increase`: `[WRAP?, APPROVE?, SWAP?, DEPOSIT]`. `DEPOSIT` depends on
    /// every prior step; `SWAP` depends on the prelude steps ahead of it (its input
    /// token must already be wrapped/approved).
    async fn plan_enter(registry: &AdapterRegistry, request: &PlanRequest<'_>, steps: &mut Vec<Step>) -> Result<(), PlanError> {
        let amount_usd = request.signal.amount_usd.ok_or(PlanError::MissingAmount {
            action: request.signal.action,
        })?;

        let mut index: StepIndex = 0;
        let mut prelude_indices = Vec::new();

        if let Some(funding) = request.funding.get(&StepKind::Deposit) {
            for kind in FundPreparer::prelude_for(StepKind::Deposit, &funding.snapshot) {
                let step = Self::encode_token_op(request, index, kind, vec![])?;
                prelude_indices.push(index);
                steps.push(step);
                index += 1;
            }
        }

        if request.funding.contains_key(&StepKind::Swap) {
            let swap_protocol_id = request.swap_protocol_id.ok_or(PlanError::MissingSwapProtocol)?;
            let swap_step =
                Self::encode_via_protocol(registry, request, swap_protocol_id, index, StepKind::Swap, prelude_indices.clone(), amount_usd)
                    .await?;
            prelude_indices.push(index);
            steps.push(swap_step);
            index += 1;
        }

        let deposit_step =
            Self::encode_via_protocol(registry, request, request.protocol_id, index, StepKind::Deposit, prelude_indices, amount_usd)
                .await?;
        steps.push(deposit_step);
        Ok(())
    }

    /// `true` if the signal's protocol advertises `CanHarvest`.
    fn protocol_can_harvest(registry: &AdapterRegistry, request: &PlanRequest<'_>) -> bool {
        registry
            .get(request.protocol_id, Self::chain_family(request))
            .map(|adapter| adapter.capabilities().contains(AdapterCapabilities::HARVEST))
            .unwrap_or(false)
    }

    /// `exit`/`decrease`: `[HARVEST?, WITHDRAW]`. `WITHDRAW` depends on `HARVEST`
    /// when present. The harvest leg is skipped (rather than erroring) when the
    /// protocol doesn't support it, even if the caller thinks rewards are pending.
    async fn plan_exit(registry: &AdapterRegistry, request: &PlanRequest<'_>, steps: &mut Vec<Step>) -> Result<(), PlanError> {
        let amount_usd = request.signal.amount_usd.unwrap_or(Decimal::ZERO);
        let mut index: StepIndex = 0;
        let mut depends_on = Vec::new();

        if request.has_pending_rewards && Self::protocol_can_harvest(registry, request) {
            let harvest =
                Self::encode_via_protocol(registry, request, request.protocol_id, index, StepKind::Harvest, vec![], Decimal::ZERO)
                    .await?;
            depends_on.push(index);
            steps.push(harvest);
            index += 1;
        }

        let withdraw =
            Self::encode_via_protocol(registry, request, request.protocol_id, index, StepKind::Withdraw, depends_on, amount_usd).await?;
        steps.push(withdraw);
        Ok(())
    }

    /// `compound`: `[HARVEST, SWAP*, DEPOSIT]`. A single swap leg covers the
    /// reward-to-deposit-token conversion; multi-reward-token compounding would add
    /// one `SWAP` per reward asset, all depending on `HARVEST`.
    async fn plan_compound(registry: &AdapterRegistry, request: &PlanRequest<'_>, steps: &mut Vec<Step>) -> Result<(), PlanError> {
        let mut index: StepIndex = 0;
        let harvest =
            Self::encode_via_protocol(registry, request, request.protocol_id, index, StepKind::Harvest, vec![], Decimal::ZERO).await?;
        steps.push(harvest);
        let harvest_index = index;
        index += 1;

        let mut deposit_depends_on = vec![harvest_index];
        if request.funding.contains_key(&StepKind::Swap) {
            let swap_protocol_id = request.swap_protocol_id.ok_or(PlanError::MissingSwapProtocol)?;
            let swap =
                Self::encode_via_protocol(registry, request, swap_protocol_id, index, StepKind::Swap, vec![harvest_index], Decimal::ZERO)
                    .await?;
            steps.push(swap);
            deposit_depends_on.push(index);
            index += 1;
        }

        let deposit =
            Self::encode_via_protocol(registry, request, request.protocol_id, index, StepKind::Deposit, deposit_depends_on, Decimal::ZERO)
                .await?;
        steps.push(deposit);
        Ok(())
    }

    /// `rebalance`: the exit leg on the source pool, then (cross-chain only) an HTLC
    /// bridge lock/claim pair, then the enter leg on the destination pool. The claim
    /// step's static dependency is on the lock step only; its true gate is
    /// time-based (the source-chain confirmation), which the dispatcher enforces by
    /// polling rather than the plan's dependency graph.
    async fn plan_rebalance(registry: &AdapterRegistry, request: &PlanRequest<'_>, steps: &mut Vec<Step>) -> Result<(), PlanError> {
        request
            .signal
            .params
            .get("targetPoolId")
            .and_then(|v| v.as_str())
            .ok_or(PlanError::MissingTargetPool)?;

        Self::plan_exit(registry, request, steps).await?;
        let mut last_index = (steps.len() - 1) as StepIndex;

        if request.is_cross_chain {
            let lock = Self::encode_via_protocol(
                registry,
                request,
                HTLC_BRIDGE_PROTOCOL_ID,
                last_index + 1,
                StepKind::BridgeLock,
                vec![last_index],
                Decimal::ZERO,
            )
            .await?;
            steps.push(lock);
            last_index += 1;

            let claim = Self::encode_via_protocol(
                registry,
                request,
                HTLC_BRIDGE_PROTOCOL_ID,
                last_index + 1,
                StepKind::BridgeClaim,
                vec![last_index],
                Decimal::ZERO,
            )
            .await?;
            steps.push(claim);
            last_index += 1;
        }

        let enter_start = (last_index + 1) as usize;
        Self::plan_enter(registry, request, steps).await?;
        // Re-index and re-wire the enter leg's internal dependencies to start after
        // the exit/bridge prefix, since `plan_enter` always starts counting from 0.
        for step in steps.iter_mut().skip(enter_start) {
            step.index += last_index + 1;
            for dep in step.depends_on.iter_mut() {
                *dep += last_index + 1;
            }
            step.depends_on.push(last_index);
        }
        Ok(())
    }
}
