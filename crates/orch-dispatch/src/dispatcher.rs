//! The top-level signal pipeline (`spec.md` §4.10): dedupe, policy-gate, plan, then
//! drive each step through to a terminal status. One [`run_chain_worker`] per chain
//! drains that chain's lane of the [`SignalQueue`] serially — nonce contention on a
//! single chain makes concurrent execution within a lane unsafe — while separate
//! chains run as independent tokio tasks.

use std::sync::Arc;
use std::time::Duration;

use orch_execution::nonce_manager::NonceSource;
use orch_execution::tx_executor::{ExecutionContext, ExecutionError, TxExecutor};
use orch_store::queue::{QueueError, SignalQueue};
use orch_store::store::{AuditEntry, AuditLogStore, StoreError, TxRecordStore};
use orch_types::config::SystemConfig;
use orch_types::error::AuditSeverity;
use orch_types::plan::StepIndex;
use orch_types::record::TxStatus;
use tokio_util::sync::CancellationToken;

use crate::execution_planner::{ExecutionPlanner, PlanError, PlanRequest};
use crate::policy_gate::{PolicyContext, PolicyGate, PolicyRejection};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What happened to one signal's pipeline run. Policy rejections and step failures
/// are ordinary outcomes, not [`DispatchError`]s — the caller acks the delivery
/// either way.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// A `TxRecord` for this signal already exists; it was planned on a previous
    /// (possibly redelivered) attempt and is not re-planned.
    AlreadyDispatched,
    PolicyRejected(PolicyRejection),
    PlanningFailed(String),
    /// The plan ran to completion (or partial completion). `failed_at` is the index
    /// of the step that aborted the remainder, if any.
    Executed {
        confirmed: Vec<StepIndex>,
        failed_at: Option<StepIndex>,
    },
}

pub struct SignalDispatcher;

impl SignalDispatcher {
    /// Runs the full pipeline for one signal. `plan_request.signal.signal_id` is the
    /// idempotency key checked against `context.store`.
    pub async fn dispatch_signal<N: NonceSource>(
        registry: &orch_adapter::registry::AdapterRegistry,
        plan_request: &PlanRequest<'_>,
        config: &SystemConfig,
        policy_context: &PolicyContext,
        context: &ExecutionContext<'_, N>,
        audit_store: &dyn AuditLogStore,
    ) -> Result<DispatchOutcome, DispatchError> {
        let signal = plan_request.signal;

        if !context.store.list_for_signal(&signal.signal_id).await?.is_empty() {
            return Ok(DispatchOutcome::AlreadyDispatched);
        }

        if let Err(rejection) = PolicyGate::evaluate(signal, config, policy_context) {
            audit_store
                .append(AuditEntry {
                    signal_id: signal.signal_id.clone(),
                    event_type: "policy_rejection".into(),
                    severity: AuditSeverity::Warning,
                    source: "policy_gate".into(),
                    message: rejection.to_string(),
                    at_ms: context.now_ms,
                })
                .await?;
            return Ok(DispatchOutcome::PolicyRejected(rejection));
        }

        let plan = match ExecutionPlanner::plan(registry, plan_request).await {
            Ok(plan) => plan,
            Err(err) => {
                audit_store
                    .append(AuditEntry {
                        signal_id: signal.signal_id.clone(),
                        event_type: "planning_failed".into(),
                        severity: AuditSeverity::Error,
                        source: "execution_planner".into(),
                        message: err.to_string(),
                        at_ms: context.now_ms,
                    })
                    .await?;
                return Ok(DispatchOutcome::PlanningFailed(err.to_string()));
            }
        };

        let mut completed: Vec<StepIndex> = Vec::new();
        loop {
            let ready = plan.ready_steps(&completed);
            if ready.is_empty() {
                break;
            }

            for step in ready {
                match TxExecutor::execute(&signal.signal_id, step, context, audit_store).await {
                    Ok(record) if record.status == TxStatus::Confirmed => {
                        completed.push(step.index);
                    }
                    Ok(record) => {
                        // Submitted-but-not-yet-confirmed records are left for the
                        // next worker pass; they are neither a failure nor ready to
                        // unblock dependents.
                        let _ = record;
                        return Ok(DispatchOutcome::Executed {
                            confirmed: completed,
                            failed_at: None,
                        });
                    }
                    Err(err) => {
                        Self::record_failure(audit_store, &signal.signal_id, step.index, &err, context.now_ms).await?;
                        return Ok(DispatchOutcome::Executed {
                            confirmed: completed,
                            failed_at: Some(step.index),
                        });
                    }
                }
            }
        }

        Ok(DispatchOutcome::Executed {
            confirmed: completed,
            failed_at: None,
        })
    }

    /// Writes the audit row for an aborted plan. `rebalance`/`compound` never attempt
    /// an automated rollback of an already-confirmed exit leg: a failed enter leaves
    /// funds idle on the source side, and this row is what an operator alerts on.
    async fn record_failure(
        audit_store: &dyn AuditLogStore,
        signal_id: &str,
        step_index: StepIndex,
        err: &ExecutionError,
        now_ms: i64,
    ) -> Result<(), StoreError> {
        audit_store
            .append(AuditEntry {
                signal_id: signal_id.to_string(),
                event_type: "step_failed".into(),
                severity: AuditSeverity::Critical,
                source: "tx_executor".into(),
                message: format!("step {step_index} aborted the plan: {err}; remainder skipped"),
                at_ms: now_ms,
            })
            .await
    }
}

/// Drains one chain's lane of `queue`, calling `handle` for each delivered signal and
/// acking once it returns. Runs until `cancellation` fires; sleeps `idle_poll` between
/// empty dequeues rather than busy-looping. Intended to be spawned once per chain by
/// the binary that wires up the orchestrator — serial within this loop, parallel
/// across chains since each gets its own task.
pub async fn run_chain_worker<F, Fut>(
    queue: Arc<dyn SignalQueue>,
    chain_id: orch_types::chain::ChainId,
    idle_poll: Duration,
    cancellation: CancellationToken,
    mut handle: F,
) -> Result<(), QueueError>
where
    F: FnMut(orch_types::signal::Signal) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    while !cancellation.is_cancelled() {
        match queue.dequeue(&chain_id).await? {
            Some((signal, delivery)) => {
                handle(signal).await;
                queue.ack(delivery).await?;
            }
            None => {
                tokio::select! {
                    _ = tokio::time::sleep(idle_poll) => {}
                    _ = cancellation.cancelled() => {}
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use orch_adapter::adapters::aave_v3::AaveV3Adapter;
    use orch_adapter::registry::AdapterRegistry;
    use orch_execution::intent_router::{RouteDecision, RouteMethod, RouteSubmitter};
    use orch_execution::key_vault::{KeyVault, SignerSecret};
    use orch_execution::nonce_manager::{NonceError, NonceManager};
    use orch_execution::tx_executor::{ChainSubmitter, Confirmation, SignedTx, Signer};
    use orch_execution::tx_simulator::{SimulationError, SimulationOutcome, TxSimulator};
    use orch_store::memory_queue::InMemorySignalQueue;
    use orch_store::memory_store::InMemoryStore;
    use orch_types::chain::ChainId;
    use orch_types::payload::TxPayload;
    use orch_types::signal::{Action, Signal};
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    struct ZeroNonceSource;
    #[async_trait]
    impl NonceSource for ZeroNonceSource {
        async fn fetch_next_nonce(&self, _chain_id: &ChainId, _address: &str) -> Result<u64, NonceError> {
            Ok(0)
        }
    }

    struct SucceedingSimulator;
    #[async_trait]
    impl TxSimulator for SucceedingSimulator {
        async fn simulate(&self, _chain_id: &ChainId, _payload: &TxPayload) -> Result<SimulationOutcome, SimulationError> {
            Ok(SimulationOutcome {
                would_succeed: true,
                estimated_gas: Some(21_000),
                estimated_amount_out: None,
                revert_reason: None,
            })
        }
    }

    struct NoopSigner;
    #[async_trait]
    impl Signer for NoopSigner {
        async fn sign(&self, _secret: &SignerSecret, _nonce: Option<u64>, _payload: &TxPayload) -> Result<SignedTx, String> {
            Ok(SignedTx(vec![0u8; 4]))
        }
    }

    struct ImmediateSubmitter;
    #[async_trait]
    impl ChainSubmitter for ImmediateSubmitter {
        async fn submit(&self, _chain_id: &ChainId, _signed: &SignedTx) -> Result<String, String> {
            Ok("0xhash".into())
        }
        async fn poll_confirmation(&self, _chain_id: &ChainId, _tx_hash: &str) -> Result<Confirmation, String> {
            Ok(Confirmation::Confirmed { tx_hash: "0xhash".into() })
        }
    }

    struct FailingSubmitter;
    #[async_trait]
    impl ChainSubmitter for FailingSubmitter {
        async fn submit(&self, _chain_id: &ChainId, _signed: &SignedTx) -> Result<String, String> {
            Err("rpc rejected the transaction".into())
        }
        async fn poll_confirmation(&self, _chain_id: &ChainId, _tx_hash: &str) -> Result<Confirmation, String> {
            Ok(Confirmation::Pending)
        }
    }

    /// Every signal/step in this module's fixtures is small enough and on a chain with
    /// no aggregator configured, so it always resolves to the `direct` route.
    struct PanicsIfRouted;
    #[async_trait]
    impl RouteSubmitter for PanicsIfRouted {
        async fn submit_via_route(
            &self,
            _method: RouteMethod,
            _chain_id: &ChainId,
            _owner: &str,
            _payload: &TxPayload,
        ) -> Result<RouteDecision, String> {
            panic!("direct route must never call a RouteSubmitter")
        }
    }

    fn registry() -> AdapterRegistry {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(AaveV3Adapter::for_chain(42161)));
        registry
    }

    fn signal(signal_id: &str) -> Signal {
        Signal {
            signal_id: signal_id.into(),
            strategy_id: "momentum-v2".into(),
            chain_id: ChainId::new("eip155", "42161"),
            protocol_id: "aave-v3".into(),
            action: Action::Enter,
            position_id: None,
            amount_usd: Some(Decimal::new(1_000, 0)),
            owner: "0xowner".into(),
            max_slippage_bps: None,
            urgency: orch_types::signal::Urgency::Normal,
            params: Default::default(),
            created_at_ms: 0,
        }
    }

    fn deposit_funding() -> HashMap<orch_types::plan::StepKind, crate::execution_planner::StepFunding> {
        let mut funding = HashMap::new();
        funding.insert(
            orch_types::plan::StepKind::Deposit,
            crate::execution_planner::StepFunding {
                snapshot: orch_execution::fund_preparer::FundingSnapshot {
                    native_balance: Decimal::ZERO,
                    wrapped_balance: Decimal::new(1_000, 0),
                    current_allowance: Decimal::new(1_000, 0),
                    required_amount: Decimal::new(1_000, 0),
                },
                args: serde_json::json!({
                    "pool": "0x87870Bca3F3fD6335C3F4ce8392D69350B4fA4E2",
                    "asset": "0xaf88d065e77c8cC2239327C5EDb3A432268e5831",
                    "amount": "1000000",
                    "on_behalf_of": "0x0000000000000000000000000000000000000001",
                }),
            },
        );
        funding
    }

    fn vault() -> KeyVault {
        let mut vault = KeyVault::new("test-passphrase".into());
        vault.load_plaintext(ChainId::new("eip155", "42161"), "0xowner".into(), b"fake-key");
        vault
    }

    fn no_op_policy_context() -> PolicyContext {
        PolicyContext {
            trailing_24h_volume_usd: Decimal::ZERO,
            target_pool_health_score: None,
            intended_aggregator: None,
        }
    }

    #[tokio::test]
    async fn dispatches_and_executes_a_fresh_signal_to_completion() {
        let registry = registry();
        let sig = signal("sig-1");
        let funding = deposit_funding();
        let plan_request = PlanRequest {
            signal: &sig,
            protocol_id: "aave-v3",
            chain_id: ChainId::new("eip155", "42161"),
            funding,
            has_pending_rewards: false,
            is_cross_chain: false,
            swap_protocol_id: None,
        };

        let store: Arc<dyn TxRecordStore> = Arc::new(InMemoryStore::new());
        let audit_store = InMemoryStore::new();
        let vault = vault();
        let nonce_manager = NonceManager::new(ZeroNonceSource);
        let simulator = SucceedingSimulator;
        let signer = NoopSigner;
        let submitter = ImmediateSubmitter;
        let route_submitter = PanicsIfRouted;
        let config = SystemConfig::default();

        let context = ExecutionContext {
            owner: "0xowner",
            max_slippage_bps: 50,
            urgency: orch_types::signal::Urgency::Normal,
            config: &config,
            confirmation_timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(10),
            retry_backoff_base: Duration::from_millis(1),
            key_vault: &vault,
            nonce_manager: &nonce_manager,
            simulator: &simulator,
            signer: &signer,
            submitter: &submitter,
            route_submitter: &route_submitter,
            store: store.clone(),
            cancellation: CancellationToken::new(),
            now_ms: 0,
        };

        let outcome = SignalDispatcher::dispatch_signal(&registry, &plan_request, &config, &no_op_policy_context(), &context, &audit_store)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Executed {
                confirmed: vec![0],
                failed_at: None
            }
        );
    }

    #[tokio::test]
    async fn a_redelivered_signal_with_an_existing_record_is_not_replanned() {
        let registry = registry();
        let sig = signal("sig-2");
        let plan_request = PlanRequest {
            signal: &sig,
            protocol_id: "aave-v3",
            chain_id: ChainId::new("eip155", "42161"),
            funding: deposit_funding(),
            has_pending_rewards: false,
            is_cross_chain: false,
            swap_protocol_id: None,
        };

        let store: Arc<dyn TxRecordStore> = Arc::new(InMemoryStore::new());
        store
            .insert_if_absent(orch_types::record::TxRecord {
                signal_id: "sig-2".into(),
                step_index: 0,
                chain_id: ChainId::new("eip155", "42161"),
                status: TxStatus::Confirmed,
                tx_hash: Some("0xhash".into()),
                nonce: Some(0),
                error: None,
                updated_at_ms: 0,
            })
            .await
            .unwrap();

        let audit_store = InMemoryStore::new();
        let vault = vault();
        let nonce_manager = NonceManager::new(ZeroNonceSource);
        let simulator = SucceedingSimulator;
        let signer = NoopSigner;
        let submitter = ImmediateSubmitter;
        let route_submitter = PanicsIfRouted;
        let config = SystemConfig::default();

        let context = ExecutionContext {
            owner: "0xowner",
            max_slippage_bps: 50,
            urgency: orch_types::signal::Urgency::Normal,
            config: &config,
            confirmation_timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(10),
            retry_backoff_base: Duration::from_millis(1),
            key_vault: &vault,
            nonce_manager: &nonce_manager,
            simulator: &simulator,
            signer: &signer,
            submitter: &submitter,
            route_submitter: &route_submitter,
            store: store.clone(),
            cancellation: CancellationToken::new(),
            now_ms: 0,
        };

        let outcome = SignalDispatcher::dispatch_signal(&registry, &plan_request, &config, &no_op_policy_context(), &context, &audit_store)
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::AlreadyDispatched);
    }

    #[tokio::test]
    async fn a_kill_switched_config_rejects_and_audits_without_planning() {
        let registry = registry();
        let sig = signal("sig-3");
        let plan_request = PlanRequest {
            signal: &sig,
            protocol_id: "aave-v3",
            chain_id: ChainId::new("eip155", "42161"),
            funding: deposit_funding(),
            has_pending_rewards: false,
            is_cross_chain: false,
            swap_protocol_id: None,
        };

        let store: Arc<dyn TxRecordStore> = Arc::new(InMemoryStore::new());
        let audit_store = InMemoryStore::new();
        let vault = vault();
        let nonce_manager = NonceManager::new(ZeroNonceSource);
        let simulator = SucceedingSimulator;
        let signer = NoopSigner;
        let submitter = ImmediateSubmitter;
        let route_submitter = PanicsIfRouted;
        let mut config = SystemConfig::default();
        config.kill_switch = true;

        let context = ExecutionContext {
            owner: "0xowner",
            max_slippage_bps: 50,
            urgency: orch_types::signal::Urgency::Normal,
            config: &config,
            confirmation_timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(10),
            retry_backoff_base: Duration::from_millis(1),
            key_vault: &vault,
            nonce_manager: &nonce_manager,
            simulator: &simulator,
            signer: &signer,
            submitter: &submitter,
            route_submitter: &route_submitter,
            store: store.clone(),
            cancellation: CancellationToken::new(),
            now_ms: 0,
        };

        let outcome = SignalDispatcher::dispatch_signal(&registry, &plan_request, &config, &no_op_policy_context(), &context, &audit_store)
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::PolicyRejected(PolicyRejection::KillSwitch));
        assert!(store.list_for_signal("sig-3").await.unwrap().is_empty());
        assert_eq!(audit_store.list_for_signal("sig-3").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn a_submission_failure_aborts_the_plan_and_audits_the_step() {
        let registry = registry();
        let sig = signal("sig-4");
        let plan_request = PlanRequest {
            signal: &sig,
            protocol_id: "aave-v3",
            chain_id: ChainId::new("eip155", "42161"),
            funding: deposit_funding(),
            has_pending_rewards: false,
            is_cross_chain: false,
            swap_protocol_id: None,
        };

        let store: Arc<dyn TxRecordStore> = Arc::new(InMemoryStore::new());
        let audit_store = InMemoryStore::new();
        let vault = vault();
        let nonce_manager = NonceManager::new(ZeroNonceSource);
        let simulator = SucceedingSimulator;
        let signer = NoopSigner;
        let submitter = FailingSubmitter;
        let route_submitter = PanicsIfRouted;
        let config = SystemConfig::default();

        let context = ExecutionContext {
            owner: "0xowner",
            max_slippage_bps: 50,
            urgency: orch_types::signal::Urgency::Normal,
            config: &config,
            confirmation_timeout: Duration::from_millis(50),
            poll_interval: Duration::from_millis(10),
            retry_backoff_base: Duration::from_millis(1),
            key_vault: &vault,
            nonce_manager: &nonce_manager,
            simulator: &simulator,
            signer: &signer,
            submitter: &submitter,
            route_submitter: &route_submitter,
            store: store.clone(),
            cancellation: CancellationToken::new(),
            now_ms: 0,
        };

        let outcome = SignalDispatcher::dispatch_signal(&registry, &plan_request, &config, &no_op_policy_context(), &context, &audit_store)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Executed {
                confirmed: vec![],
                failed_at: Some(0)
            }
        );
        let entries = audit_store.list_for_signal("sig-4").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].severity, AuditSeverity::Critical);
    }

    #[tokio::test]
    async fn run_chain_worker_drains_its_lane_serially_then_exits_on_cancellation() {
        let queue: Arc<dyn SignalQueue> = Arc::new(InMemorySignalQueue::new());
        let chain_id = ChainId::new("eip155", "42161");
        queue.enqueue(signal("sig-a")).await.unwrap();
        queue.enqueue(signal("sig-b")).await.unwrap();

        let seen = Arc::new(StdMutex::new(Vec::new()));
        let handled_count = Arc::new(AtomicUsize::new(0));
        let cancellation = CancellationToken::new();

        let worker_queue = queue.clone();
        let worker_seen = seen.clone();
        let worker_count = handled_count.clone();
        let worker_cancellation = cancellation.clone();
        let worker = tokio::spawn(run_chain_worker(worker_queue, chain_id, Duration::from_millis(5), worker_cancellation, move |s| {
            let seen = worker_seen.clone();
            let count = worker_count.clone();
            async move {
                seen.lock().unwrap().push(s.signal_id);
                count.fetch_add(1, Ordering::SeqCst);
            }
        }));

        while handled_count.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cancellation.cancel();
        worker.await.unwrap().unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["sig-a".to_string(), "sig-b".to_string()]);
    }
}
