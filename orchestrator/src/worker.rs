//! Per-chain worker: the dependencies one [`run_chain_worker`] lane needs, and the
//! per-signal pipeline that ties gas gating, policy/execution dispatch, the
//! non-custodial signature hand-off, and position bookkeeping together.
//!
//! Plans are computed twice on the hot-key path: once here (to read step kinds for
//! position bookkeeping and, on the cold path, to serialize the steps into
//! `pending_signatures`), once inside [`SignalDispatcher::dispatch_signal`] itself.
//! `ExecutionPlanner::plan` is pure encoding with no chain I/O, so the duplicate call
//! is cheap; it avoids widening `orch-dispatch`'s public API just for this binary's
//! bookkeeping needs.

use orch_adapter::registry::AdapterRegistry;
use orch_dispatch::{
    DispatchOutcome, ExecutionPlanner, GasPriceSource, GasQueue, PendingSignatureBridge, PlanRequest, PolicyContext, PositionLedger,
    SignalDispatcher,
};
use orch_execution::gas_scheduler::GasScheduler;
use orch_execution::intent_router::RouteSubmitter;
use orch_execution::key_vault::KeyVault;
use orch_execution::nonce_manager::{NonceManager, NonceSource};
use orch_execution::tx_executor::{ChainSubmitter, ExecutionContext, Signer};
use orch_execution::tx_simulator::TxSimulator;
use orch_store::store::{AuditEntry, AuditLogStore, PendingSignatureStore, PositionStore, TxRecordStore};
use orch_types::chain::ChainFamily;
use orch_types::config::ConfigWatcher;
use orch_types::error::AuditSeverity;
use orch_types::plan::StepKind;
use orch_types::record::{TxRecord, TxStatus};
use orch_types::signal::Signal;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::http::Metrics;
use crate::signal_funding;

/// `maxWaitMs` assumed when a signal's params don't specify one.
const DEFAULT_GAS_MAX_WAIT: Duration = Duration::from_secs(600);

/// `spec.md` §4.8's per-step retry backoff base.
const RETRY_BACKOFF_BASE: Duration = Duration::from_secs(2);

/// Shared, `Arc`-wrapped dependencies one chain's worker lanes (the dequeue loop and
/// the gas-queue release loop) both need. Plain fields rather than a trait object
/// per field since every implementation here is a concrete, `Send + Sync` default.
pub struct WorkerDeps<N: NonceSource> {
    pub registry: Arc<AdapterRegistry>,
    pub tx_store: Arc<dyn TxRecordStore>,
    pub audit_store: Arc<dyn AuditLogStore>,
    pub pending_store: Arc<dyn PendingSignatureStore>,
    pub position_store: Arc<dyn PositionStore>,
    pub config_watcher: Arc<ConfigWatcher>,
    pub key_vault: Arc<KeyVault>,
    pub metrics: Arc<Metrics>,
    pub nonce_manager: Arc<NonceManager<N>>,
    pub simulator: Arc<dyn TxSimulator>,
    pub signer: Arc<dyn Signer>,
    pub submitter: Arc<dyn ChainSubmitter>,
    pub route_submitter: Arc<dyn RouteSubmitter>,
    pub gas_scheduler: Arc<GasScheduler>,
    pub gas_prices: Arc<dyn GasPriceSource>,
    pub cancellation: tokio_util::sync::CancellationToken,
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn position_key(signal: &Signal) -> String {
    signal
        .position_id
        .clone()
        .unwrap_or_else(|| format!("{}:{}:{}", signal.owner, signal.chain_id, signal.protocol_id))
}

fn max_wait(signal: &Signal) -> Duration {
    signal
        .params
        .get("maxWaitMs")
        .and_then(|v| v.as_u64())
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_GAS_MAX_WAIT)
}

impl<N: NonceSource> WorkerDeps<N> {
    /// Runs the gas gate, then either hands a step off to
    /// [`PendingSignatureBridge`] (no hot key loaded) or drives it through
    /// [`SignalDispatcher::dispatch_signal`], updating [`Metrics`] and open
    /// positions as outcomes land. Returns the signal unchanged when it should be
    /// re-queued behind the gas gate instead of dispatched now.
    pub async fn admit(&self, signal: Signal, gas_queue: &GasQueue<Signal>) {
        let chain_family = signal.chain_id.family().unwrap_or(ChainFamily::Evm);
        if matches!(chain_family, ChainFamily::Evm) {
            if let Some(gwei) = self.gas_prices.current_gwei(&signal.chain_id).await {
                if self.gas_scheduler.decide(&signal.chain_id, gwei) == orch_execution::gas_scheduler::GateDecision::Wait {
                    self.metrics.gas_gate_wait_depth.fetch_add(1, Ordering::Relaxed);
                    let chain_id = signal.chain_id.clone();
                    let wait = max_wait(&signal);
                    gas_queue.enqueue(signal, chain_id, wait);
                    return;
                }
            }
        }
        self.dispatch_one(signal).await;
    }

    pub async fn dispatch_one(&self, signal: Signal) {
        self.metrics.signals_dispatched.fetch_add(1, Ordering::Relaxed);

        let funding = signal_funding::resolve(&signal);
        let chain_family = signal.chain_id.family().unwrap_or(ChainFamily::Evm);
        let plan_request = PlanRequest {
            signal: &signal,
            protocol_id: &signal.protocol_id,
            chain_id: signal.chain_id.clone(),
            funding,
            has_pending_rewards: false,
            is_cross_chain: false,
            swap_protocol_id: match chain_family {
                ChainFamily::Solana => Some("jupiter"),
                _ => Some("uniswap-v3"),
            },
        };

        let plan = match ExecutionPlanner::plan(&self.registry, &plan_request).await {
            Ok(plan) => plan,
            Err(err) => {
                tracing::warn!(signal_id = %signal.signal_id, %err, "planning failed");
                self.metrics.signals_failed.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        if !self.key_vault.has_signer(&signal.chain_id, &signal.owner) {
            self.hand_off_to_pending_signature(&signal, &plan).await;
            return;
        }

        let policy_context = PolicyContext {
            trailing_24h_volume_usd: rust_decimal::Decimal::ZERO,
            target_pool_health_score: None,
            intended_aggregator: None,
        };

        let snapshot = self.config_watcher.current();

        let context = ExecutionContext {
            owner: &signal.owner,
            max_slippage_bps: signal.max_slippage_bps.unwrap_or(snapshot.default_slippage_bps),
            urgency: signal.urgency,
            config: &snapshot,
            confirmation_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(500),
            retry_backoff_base: RETRY_BACKOFF_BASE,
            key_vault: self.key_vault.as_ref(),
            nonce_manager: self.nonce_manager.as_ref(),
            simulator: self.simulator.as_ref(),
            signer: self.signer.as_ref(),
            submitter: self.submitter.as_ref(),
            route_submitter: self.route_submitter.as_ref(),
            store: self.tx_store.clone(),
            cancellation: self.cancellation.clone(),
            now_ms: now_ms(),
        };

        match SignalDispatcher::dispatch_signal(&self.registry, &plan_request, &snapshot, &policy_context, &context, self.audit_store.as_ref()).await
        {
            Ok(DispatchOutcome::Executed { confirmed, failed_at }) => {
                self.apply_position_updates(&signal, &plan, &confirmed).await;
                if failed_at.is_none() {
                    self.metrics.signals_completed.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.metrics.signals_failed.fetch_add(1, Ordering::Relaxed);
                }
            }
            Ok(DispatchOutcome::PolicyRejected(_)) => {
                self.metrics.signals_rejected.fetch_add(1, Ordering::Relaxed);
            }
            Ok(DispatchOutcome::AlreadyDispatched) => {}
            Ok(DispatchOutcome::PlanningFailed(reason)) => {
                tracing::warn!(signal_id = %signal.signal_id, %reason, "planning failed");
                self.metrics.signals_failed.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                tracing::error!(signal_id = %signal.signal_id, %err, "dispatch pipeline error");
                self.metrics.signals_failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    async fn apply_position_updates(&self, signal: &Signal, plan: &orch_types::plan::Plan, confirmed: &[orch_types::plan::StepIndex]) {
        let position_id = position_key(signal);
        for step in &plan.steps {
            if !confirmed.contains(&step.index) {
                continue;
            }
            let result = match step.kind {
                StepKind::Deposit => {
                    PositionLedger::on_deposit_confirmed(
                        self.position_store.as_ref(),
                        &position_id,
                        &signal.owner,
                        step.chain_id.clone(),
                        &signal.protocol_id,
                        step.usd_value,
                        now_ms(),
                    )
                    .await
                    .map(|_| ())
                }
                StepKind::Withdraw => PositionLedger::on_withdraw_confirmed(self.position_store.as_ref(), &position_id, step.usd_value, now_ms())
                    .await
                    .map(|_| ()),
                _ => Ok(()),
            };
            if let Err(err) = result {
                tracing::warn!(signal_id = %signal.signal_id, %err, "position ledger update failed");
            }
        }
    }

    /// Non-custodial path (`spec.md` §4.12, scenario S5): no hot key loaded for this
    /// signal's `(chain, owner)`. Serializes every planned step into
    /// `pending_signatures` instead of signing/submitting, leaving each step's
    /// `TxRecord` `PENDING` until an external signer reports back.
    async fn hand_off_to_pending_signature(&self, signal: &Signal, plan: &orch_types::plan::Plan) {
        for step in &plan.steps {
            let Some(payload) = step.payload.clone() else { continue };

            if self.tx_store.get(&signal.signal_id, step.index).await.ok().flatten().is_some() {
                continue;
            }

            if let Err(err) = self
                .tx_store
                .insert_if_absent(TxRecord {
                    signal_id: signal.signal_id.clone(),
                    step_index: step.index,
                    chain_id: step.chain_id.clone(),
                    status: TxStatus::Pending,
                    tx_hash: None,
                    nonce: None,
                    error: None,
                    updated_at_ms: now_ms(),
                })
                .await
            {
                tracing::warn!(signal_id = %signal.signal_id, %err, "failed to record pending tx");
                continue;
            }

            if let Err(err) = PendingSignatureBridge::request_signature(
                self.pending_store.as_ref(),
                &signal.signal_id,
                step.index,
                step.chain_id.clone(),
                &signal.owner,
                payload,
                now_ms(),
            )
            .await
            {
                tracing::warn!(signal_id = %signal.signal_id, %err, "failed to request a pending signature");
            }
        }

        let _ = self
            .audit_store
            .append(AuditEntry {
                signal_id: signal.signal_id.clone(),
                event_type: "pending_signature_requested".into(),
                severity: AuditSeverity::Info,
                source: "pending_signature_bridge".into(),
                message: format!("no hot key loaded for ({}, {}); steps handed to an external signer", signal.chain_id, signal.owner),
                at_ms: now_ms(),
            })
            .await;
    }
}

/// Drains `gas_queue` on its own tick, dispatching every signal it releases through
/// the same [`WorkerDeps::dispatch_one`] path a direct admission would have used.
/// Runs as a sibling task to the chain's `run_chain_worker` dequeue loop so gas-gated
/// signals don't block signals behind them in the `SignalQueue`.
pub async fn run_gas_release_loop<N: NonceSource>(
    deps: Arc<WorkerDeps<N>>,
    gas_queue: Arc<GasQueue<Signal>>,
    cancellation: tokio_util::sync::CancellationToken,
) {
    while !cancellation.is_cancelled() {
        tokio::select! {
            _ = tokio::time::sleep(orch_dispatch::gas_queue::DEFAULT_POLL_INTERVAL) => {}
            _ = cancellation.cancelled() => break,
        }

        let released = gas_queue.tick(deps.gas_prices.as_ref()).await;
        for released in released {
            deps.metrics.gas_gate_wait_depth.fetch_sub(1, Ordering::Relaxed);
            if released.timed_out {
                let _ = deps
                    .audit_store
                    .append(AuditEntry {
                        signal_id: released.item.signal_id.clone(),
                        event_type: "gas_gate_timeout".into(),
                        severity: AuditSeverity::Warning,
                        source: "gas_queue".into(),
                        message: "max_wait elapsed while gas was still over ceiling; executing anyway".into(),
                        at_ms: now_ms(),
                    })
                    .await;
            }
            deps.dispatch_one(released.item).await;
        }
    }
}

/// Expires stale `pending_signatures` rows and resumes confirmation polling for rows
/// an external signer has marked `Broadcasted` (`spec.md` §4.12, scenario S5).
pub async fn run_pending_signature_watch_loop(
    pending_store: Arc<dyn PendingSignatureStore>,
    tx_store: Arc<dyn TxRecordStore>,
    audit_store: Arc<dyn AuditLogStore>,
    submitter: Arc<dyn ChainSubmitter>,
    cancellation: tokio_util::sync::CancellationToken,
) {
    use orch_execution::tx_executor::Confirmation;
    use orch_types::pending_signature::PendingSignatureStatus;

    const TICK: Duration = Duration::from_secs(5);

    while !cancellation.is_cancelled() {
        tokio::select! {
            _ = tokio::time::sleep(TICK) => {}
            _ = cancellation.cancelled() => break,
        }

        if let Ok(expired) = PendingSignatureBridge::expire_stale(pending_store.as_ref(), now_ms()).await {
            for pending in expired {
                let _ = tx_store
                    .update(TxRecord {
                        signal_id: pending.signal_id.clone(),
                        step_index: pending.step_index,
                        chain_id: pending.chain_id.clone(),
                        status: TxStatus::Rejected,
                        tx_hash: None,
                        nonce: None,
                        error: Some("signature_timeout".into()),
                        updated_at_ms: now_ms(),
                    })
                    .await;
                let _ = audit_store
                    .append(AuditEntry {
                        signal_id: pending.signal_id.clone(),
                        event_type: "signature_timeout".into(),
                        severity: AuditSeverity::Warning,
                        source: "pending_signature_bridge".into(),
                        message: format!("step {} expired waiting on an external signature", pending.step_index),
                        at_ms: now_ms(),
                    })
                    .await;
            }
        }

        if let Ok(rows) = pending_store.list_pending().await {
            for pending in rows {
                if pending.status != PendingSignatureStatus::Broadcasted {
                    continue;
                }
                let Some(tx_hash) = pending.signed_tx.clone() else { continue };
                if let Ok(Confirmation::Confirmed { .. }) = submitter.poll_confirmation(&pending.chain_id, &tx_hash).await {
                    let _ = tx_store
                        .update(TxRecord {
                            signal_id: pending.signal_id.clone(),
                            step_index: pending.step_index,
                            chain_id: pending.chain_id.clone(),
                            status: TxStatus::Confirmed,
                            tx_hash: Some(tx_hash),
                            nonce: None,
                            error: None,
                            updated_at_ms: now_ms(),
                        })
                        .await;
                }
            }
        }
    }
}
