//! Per-chain transaction execution: the component that turns one planned [`Step`]
//! into a confirmed (or definitively failed) on-chain transaction.
//!
//! The flow mirrors the teacher's EVM provider's send-and-confirm loop, generalized
//! across chain families and made explicit rather than delegated to a single chain
//! library's filler stack:
//!
//! 1. idempotency check against the `TxRecord` store
//! 2. simulate the payload, bail out on a predicted revert
//! 3. check simulated slippage against the signal's tolerance
//! 4. consult `IntentRouter` for the submission path; non-`direct` routes hand off
//!    submission end-to-end
//! 5. acquire a nonce (chain families that have one) and sign with the funding
//!    wallet's secret — `direct` route only
//! 6. submit to the chain
//! 7. poll for confirmation up to a deadline
//! 8. record the terminal status, resetting the nonce cache on a nonce-mismatch error
//!
//! Steps 4-6 retry as a unit, up to [`DEFAULT_MAX_RETRIES_PER_STEP`] times with
//! linear backoff, for the transient error classes `ErrorKind::is_retryable` names.
//! `autopilot_dry_run` short-circuits after step 4: the step is planned and audited
//! but never reaches a submitter.

use async_trait::async_trait;
use orch_types::chain::{ChainFamily, ChainId};
use orch_types::config::SystemConfig;
use orch_types::error::{AuditSeverity, Classify, ErrorKind};
use orch_types::payload::TxPayload;
use orch_types::plan::{Step, StepIndex};
use orch_types::record::{TxRecord, TxStatus};
use orch_types::signal::Urgency;
use orch_store::store::{AuditEntry, AuditLogStore, StoreError, TxRecordStore};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::intent_router::{IntentRouter, RouteSubmitter};
use crate::key_vault::{KeyVault, KeyVaultError, SignerSecret};
use crate::nonce_manager::{NonceError, NonceManager, NonceSource};
use crate::tx_simulator::{SimulationError, SimulationOutcome, TxSimulator};

/// `spec.md` §4.8/§7: a step is retried at most this many times, beyond its first
/// attempt, on a transient error class.
pub const DEFAULT_MAX_RETRIES_PER_STEP: u32 = 2;

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    #[error(transparent)]
    Nonce(#[from] NonceError),
    #[error(transparent)]
    KeyVault(#[from] KeyVaultError),
    #[error("signing failed: {0}")]
    SigningFailed(String),
    #[error("submission failed: {0}")]
    SubmissionFailed(String),
    #[error("submission rejected for a nonce reason: {0}")]
    NonceRejected(String),
    #[error("route submission failed: {0}")]
    RouteFailed(String),
    #[error("simulation predicted a revert: {0}")]
    Reverted(String),
    #[error("estimated slippage exceeded the signal's tolerance ({actual_bps} > {max_bps} bps)")]
    SlippageExceeded { actual_bps: Decimal, max_bps: u32 },
    #[error("confirmation did not land within the deadline")]
    ConfirmationTimeout,
    #[error("step already recorded as {0:?}, not re-executing")]
    AlreadyTerminal(TxStatus),
    #[error("execution cancelled")]
    Cancelled,
}

impl Classify for ExecutionError {
    fn kind(&self) -> ErrorKind {
        match self {
            ExecutionError::Store(_) => ErrorKind::Config,
            ExecutionError::Simulation(_) => ErrorKind::SimulationFailed,
            ExecutionError::Nonce(_) => ErrorKind::NonceMismatch,
            ExecutionError::KeyVault(_) => ErrorKind::Config,
            ExecutionError::SigningFailed(_) => ErrorKind::Config,
            ExecutionError::SubmissionFailed(_) => ErrorKind::RpcTransient,
            ExecutionError::NonceRejected(_) => ErrorKind::NonceMismatch,
            ExecutionError::RouteFailed(_) => ErrorKind::RpcTransient,
            ExecutionError::Reverted(_) => ErrorKind::Reverted,
            ExecutionError::SlippageExceeded { .. } => ErrorKind::SlippageExceeded,
            ExecutionError::ConfirmationTimeout => ErrorKind::Timeout,
            ExecutionError::AlreadyTerminal(_) => ErrorKind::PolicyRejection,
            ExecutionError::Cancelled => ErrorKind::Timeout,
        }
    }
}

/// An unsigned payload turned into chain-ready signed bytes. Opaque outside the
/// submitter that produced it.
#[derive(Debug, Clone)]
pub struct SignedTx(pub Vec<u8>);

#[async_trait]
pub trait Signer: Send + Sync {
    async fn sign(&self, secret: &SignerSecret, nonce: Option<u64>, payload: &TxPayload) -> Result<SignedTx, String>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Confirmation {
    Confirmed { tx_hash: String },
    Pending,
}

/// Implemented once per chain family: broadcasts a signed transaction and polls for
/// its confirmation status.
#[async_trait]
pub trait ChainSubmitter: Send + Sync {
    async fn submit(&self, chain_id: &ChainId, signed: &SignedTx) -> Result<String, String>;
    async fn poll_confirmation(&self, chain_id: &ChainId, tx_hash: &str) -> Result<Confirmation, String>;
}

fn chain_family_uses_nonces(family: ChainFamily) -> bool {
    matches!(family, ChainFamily::Evm | ChainFamily::Aptos)
}

pub struct ExecutionContext<'a, N: NonceSource> {
    pub owner: &'a str,
    pub max_slippage_bps: u32,
    pub urgency: Urgency,
    pub config: &'a SystemConfig,
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
    /// Base delay for the per-step retry loop's linear backoff; attempt `n` sleeps
    /// `retry_backoff_base * n`. `spec.md` §4.8 default is 2s; tests use milliseconds.
    pub retry_backoff_base: Duration,
    pub key_vault: &'a KeyVault,
    pub nonce_manager: &'a NonceManager<N>,
    pub simulator: &'a dyn TxSimulator,
    pub signer: &'a dyn Signer,
    pub submitter: &'a dyn ChainSubmitter,
    pub route_submitter: &'a dyn RouteSubmitter,
    pub store: Arc<dyn TxRecordStore>,
    pub cancellation: CancellationToken,
    pub now_ms: i64,
}

/// What one (possibly retried) attempt at a step produced.
enum StepOutcome {
    /// `autopilot_dry_run`: planned and audited, never submitted.
    DryRunPlanned(TxRecord),
    /// Ready for the confirmation-poll tail. `tx_hash` is `None` for an order-based
    /// route (CoW/UniswapX/1inch Fusion) that hasn't filled yet; the record is left
    /// `status` for a later worker pass to pick up.
    Ready {
        tx_hash: Option<String>,
        status: TxStatus,
        nonce: Option<u64>,
    },
}

pub struct TxExecutor;

impl TxExecutor {
    /// `audit_store` is a sibling parameter rather than part of `context`, mirroring
    /// `SignalDispatcher::dispatch_signal`'s existing split between chain-execution
    /// dependencies and the audit sink.
    pub async fn execute<N: NonceSource>(
        signal_id: &str,
        step: &Step,
        context: &ExecutionContext<'_, N>,
        audit_store: &dyn AuditLogStore,
    ) -> Result<TxRecord, ExecutionError> {
        if let Some(existing) = context.store.get(signal_id, step.index).await? {
            if existing.status.is_terminal() {
                return Err(ExecutionError::AlreadyTerminal(existing.status));
            }
        } else {
            context
                .store
                .insert_if_absent(pending_record(signal_id, step.index, &step.chain_id, context.now_ms))
                .await?;
        }

        if context.cancellation.is_cancelled() {
            return Err(ExecutionError::Cancelled);
        }

        let payload = step
            .payload
            .as_ref()
            .ok_or_else(|| ExecutionError::SigningFailed("step has no encoded payload".into()))?;

        let mut attempt: u32 = 0;
        let (tx_hash, status, nonce) = loop {
            match Self::attempt_step(signal_id, step, context, payload, audit_store).await {
                Ok(StepOutcome::DryRunPlanned(record)) => return Ok(record),
                Ok(StepOutcome::Ready { tx_hash, status, nonce }) => break (tx_hash, status, nonce),
                Err(err) => {
                    attempt += 1;
                    let widening_ok = err.kind() == ErrorKind::SlippageExceeded && context.config.allow_slippage_widening;
                    if (err.kind().is_retryable() || widening_ok) && attempt <= DEFAULT_MAX_RETRIES_PER_STEP {
                        tokio::time::sleep(context.retry_backoff_base * attempt).await;
                        continue;
                    }
                    mark_failed(&context.store, signal_id, step.index, &step.chain_id, &err.to_string(), context.now_ms).await?;
                    return Err(err);
                }
            }
        };

        let Some(tx_hash) = tx_hash else {
            let record = TxRecord {
                signal_id: signal_id.to_string(),
                step_index: step.index,
                chain_id: step.chain_id.clone(),
                status,
                tx_hash: None,
                nonce,
                error: None,
                updated_at_ms: context.now_ms,
            };
            context.store.update(record.clone()).await?;
            return Ok(record);
        };

        context
            .store
            .update(TxRecord {
                signal_id: signal_id.to_string(),
                step_index: step.index,
                chain_id: step.chain_id.clone(),
                status: TxStatus::Submitted,
                tx_hash: Some(tx_hash.clone()),
                nonce,
                error: None,
                updated_at_ms: context.now_ms,
            })
            .await?;

        let confirmed = poll_until_confirmed_or_timeout(context, &step.chain_id, &tx_hash).await?;

        let final_record = TxRecord {
            signal_id: signal_id.to_string(),
            step_index: step.index,
            chain_id: step.chain_id.clone(),
            status: if confirmed { TxStatus::Confirmed } else { TxStatus::Failed },
            tx_hash: Some(tx_hash),
            nonce,
            error: None,
            updated_at_ms: context.now_ms,
        };
        context.store.update(final_record.clone()).await?;

        if confirmed {
            Ok(final_record)
        } else {
            Err(ExecutionError::ConfirmationTimeout)
        }
    }

    /// One attempt at simulate → slippage check → route → (dry-run short-circuit |
    /// direct nonce/sign/submit). The retried unit in [`Self::execute`]'s loop.
    async fn attempt_step<N: NonceSource>(
        signal_id: &str,
        step: &Step,
        context: &ExecutionContext<'_, N>,
        payload: &TxPayload,
        audit_store: &dyn AuditLogStore,
    ) -> Result<StepOutcome, ExecutionError> {
        let simulation = context.simulator.simulate(&step.chain_id, payload).await?;
        check_simulation(&simulation, step, context.max_slippage_bps)?;

        let decision = IntentRouter::route(
            &step.chain_id,
            context.owner,
            step.usd_value,
            context.urgency,
            context.config,
            payload,
            context.route_submitter,
        )
        .await
        .map_err(ExecutionError::RouteFailed)?;

        if context.config.autopilot_dry_run {
            audit_store
                .append(AuditEntry {
                    signal_id: signal_id.to_string(),
                    event_type: "dry_run_planned".into(),
                    severity: AuditSeverity::Info,
                    source: "tx_executor".into(),
                    message: format!(
                        "step {} planned via {:?}; autopilot_dry_run suppressed submission",
                        step.index, decision.method
                    ),
                    at_ms: context.now_ms,
                })
                .await?;
            return Ok(StepOutcome::DryRunPlanned(pending_record(
                signal_id,
                step.index,
                &step.chain_id,
                context.now_ms,
            )));
        }

        if !decision.method.is_direct() {
            return Ok(StepOutcome::Ready {
                tx_hash: decision.tx_hash,
                status: decision.status,
                nonce: None,
            });
        }

        let (tx_hash, nonce) = Self::submit_direct(context, step, payload).await?;
        Ok(StepOutcome::Ready {
            tx_hash: Some(tx_hash),
            status: TxStatus::Submitted,
            nonce,
        })
    }

    /// Nonce acquisition, signing, and submission for the `direct` route. On a
    /// nonce-flavored rejection the cache is reset immediately so the next attempt
    /// (this one or a retry) reseeds from the chain.
    async fn submit_direct<N: NonceSource>(
        context: &ExecutionContext<'_, N>,
        step: &Step,
        payload: &TxPayload,
    ) -> Result<(String, Option<u64>), ExecutionError> {
        let nonce = if chain_family_uses_nonces(step.chain_id.family().unwrap_or(ChainFamily::Evm)) {
            Some(context.nonce_manager.next_nonce(&step.chain_id, context.owner).await?)
        } else {
            None
        };

        let secret = context.key_vault.decrypt(&step.chain_id, context.owner)?;

        let signed = context
            .signer
            .sign(&secret, nonce, payload)
            .await
            .map_err(ExecutionError::SigningFailed)?;

        match context.submitter.submit(&step.chain_id, &signed).await {
            Ok(hash) => Ok((hash, nonce)),
            Err(reason) if reason.to_lowercase().contains("nonce") => {
                context.nonce_manager.reset(&step.chain_id, context.owner).await;
                Err(ExecutionError::NonceRejected(reason))
            }
            Err(reason) => Err(ExecutionError::SubmissionFailed(reason)),
        }
    }
}

fn check_simulation(simulation: &SimulationOutcome, step: &Step, max_slippage_bps: u32) -> Result<(), ExecutionError> {
    if !simulation.would_succeed {
        return Err(ExecutionError::Reverted(
            simulation.revert_reason.clone().unwrap_or_else(|| "unknown".into()),
        ));
    }

    if let (Some(quoted), Some(estimated)) = (step.quoted_amount_out, simulation.estimated_amount_out) {
        if quoted > Decimal::ZERO && estimated < quoted {
            let actual_bps = (quoted - estimated) / quoted * Decimal::new(10_000, 0);
            if actual_bps > Decimal::from(max_slippage_bps) {
                return Err(ExecutionError::SlippageExceeded {
                    actual_bps,
                    max_bps: max_slippage_bps,
                });
            }
        }
    }

    Ok(())
}

async fn poll_until_confirmed_or_timeout<N: NonceSource>(
    context: &ExecutionContext<'_, N>,
    chain_id: &ChainId,
    tx_hash: &str,
) -> Result<bool, ExecutionError> {
    let deadline = tokio::time::Instant::now() + context.confirmation_timeout;
    loop {
        if context.cancellation.is_cancelled() {
            return Err(ExecutionError::Cancelled);
        }
        match context.submitter.poll_confirmation(chain_id, tx_hash).await {
            Ok(Confirmation::Confirmed { .. }) => return Ok(true),
            Ok(Confirmation::Pending) => {}
            Err(_) => {}
        }
        if tokio::time::Instant::now() >= deadline {
            return Ok(false);
        }
        tokio::time::sleep(context.poll_interval).await;
    }
}

fn pending_record(signal_id: &str, step_index: StepIndex, chain_id: &ChainId, now_ms: i64) -> TxRecord {
    TxRecord {
        signal_id: signal_id.to_string(),
        step_index,
        chain_id: chain_id.clone(),
        status: TxStatus::Pending,
        tx_hash: None,
        nonce: None,
        error: None,
        updated_at_ms: now_ms,
    }
}

async fn mark_failed(
    store: &Arc<dyn TxRecordStore>,
    signal_id: &str,
    step_index: StepIndex,
    chain_id: &ChainId,
    reason: &str,
    now_ms: i64,
) -> Result<(), StoreError> {
    store
        .update(TxRecord {
            signal_id: signal_id.to_string(),
            step_index,
            chain_id: chain_id.clone(),
            status: TxStatus::Failed,
            tx_hash: None,
            nonce: None,
            error: Some(reason.to_string()),
            updated_at_ms: now_ms,
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent_router::{RouteDecision, RouteMethod};
    use crate::nonce_manager::NonceSource;
    use orch_store::memory_store::InMemoryStore;
    use orch_types::chain::ChainId;
    use orch_types::payload::EvmPayload;
    use orch_types::plan::StepKind;
    use std::sync::atomic::{AtomicU32, Ordering};

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

    struct RevertingSimulator;
    #[async_trait]
    impl TxSimulator for RevertingSimulator {
        async fn simulate(&self, _chain_id: &ChainId, _payload: &TxPayload) -> Result<SimulationOutcome, SimulationError> {
            Ok(SimulationOutcome {
                would_succeed: false,
                estimated_gas: None,
                estimated_amount_out: None,
                revert_reason: Some("insufficient collateral".into()),
            })
        }
    }

    /// Simulates an output 10% below the step's quote — well past a 50bps tolerance.
    struct SlippingSimulator;
    #[async_trait]
    impl TxSimulator for SlippingSimulator {
        async fn simulate(&self, _chain_id: &ChainId, _payload: &TxPayload) -> Result<SimulationOutcome, SimulationError> {
            Ok(SimulationOutcome {
                would_succeed: true,
                estimated_gas: Some(21_000),
                estimated_amount_out: Some(Decimal::new(900, 0)),
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

    /// Rejects with a nonce-flavored error on its first `attempts_before_success`
    /// calls, then succeeds. Used to exercise the nonce-reset-then-retry path (S6).
    struct FlakyNonceSubmitter {
        attempts_before_success: u32,
        calls: AtomicU32,
        resets_observed: Arc<AtomicU32>,
    }
    #[async_trait]
    impl ChainSubmitter for FlakyNonceSubmitter {
        async fn submit(&self, _chain_id: &ChainId, _signed: &SignedTx) -> Result<String, String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.attempts_before_success {
                Err("nonce too low".into())
            } else {
                Ok("0xhash".into())
            }
        }
        async fn poll_confirmation(&self, _chain_id: &ChainId, _tx_hash: &str) -> Result<Confirmation, String> {
            Ok(Confirmation::Confirmed { tx_hash: "0xhash".into() })
        }
    }

    /// A `NonceSource` that counts how many times its cache would have been reseeded,
    /// standing in for asserting `NonceManager::reset` ran.
    struct CountingNonceSource {
        fetches: Arc<AtomicU32>,
    }
    #[async_trait]
    impl NonceSource for CountingNonceSource {
        async fn fetch_next_nonce(&self, _chain_id: &ChainId, _address: &str) -> Result<u64, NonceError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        }
    }

    struct AlwaysFailingSubmitter {
        calls: AtomicU32,
    }
    #[async_trait]
    impl ChainSubmitter for AlwaysFailingSubmitter {
        async fn submit(&self, _chain_id: &ChainId, _signed: &SignedTx) -> Result<String, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err("rpc unavailable".into())
        }
        async fn poll_confirmation(&self, _chain_id: &ChainId, _tx_hash: &str) -> Result<Confirmation, String> {
            Ok(Confirmation::Pending)
        }
    }

    /// Every sample step/signal in this module resolves to the `direct` route (small
    /// USD amount on a chain with no aggregator configured), so this panics if ever
    /// called — proof the `direct` path never touches a route.
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

    fn sample_step() -> Step {
        Step {
            index: 0,
            kind: StepKind::Deposit,
            chain_id: ChainId::new("eip155", "1"),
            usd_value: Decimal::new(1000, 0),
            quoted_amount_out: None,
            depends_on: vec![],
            payload: Some(TxPayload::Evm(EvmPayload {
                to: "0xpool".into(),
                value: "0".into(),
                data: "0x".into(),
                chain_ref: 1,
                gas_limit: None,
                max_fee_per_gas_wei: None,
                max_priority_fee_per_gas_wei: None,
            })),
        }
    }

    fn sample_vault() -> KeyVault {
        let mut vault = KeyVault::new("test-passphrase".into());
        vault.load_plaintext(ChainId::new("eip155", "1"), "0xowner".into(), b"fake-key");
        vault
    }

    #[tokio::test]
    async fn executes_a_step_through_to_confirmation() {
        let store: Arc<dyn TxRecordStore> = Arc::new(InMemoryStore::new());
        let audit_store = InMemoryStore::new();
        let vault = sample_vault();
        let nonce_manager = NonceManager::new(ZeroNonceSource);
        let simulator = SucceedingSimulator;
        let signer = NoopSigner;
        let submitter = ImmediateSubmitter;
        let route_submitter = PanicsIfRouted;
        let config = SystemConfig::default();

        let context = ExecutionContext {
            owner: "0xowner",
            max_slippage_bps: 50,
            urgency: Urgency::Normal,
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

        let record = TxExecutor::execute("sig-1", &sample_step(), &context, &audit_store).await.unwrap();
        assert_eq!(record.status, TxStatus::Confirmed);
        assert_eq!(record.nonce, Some(0));
    }

    #[tokio::test]
    async fn a_predicted_revert_aborts_before_signing() {
        let store: Arc<dyn TxRecordStore> = Arc::new(InMemoryStore::new());
        let audit_store = InMemoryStore::new();
        let vault = sample_vault();
        let nonce_manager = NonceManager::new(ZeroNonceSource);
        let simulator = RevertingSimulator;
        let signer = NoopSigner;
        let submitter = ImmediateSubmitter;
        let route_submitter = PanicsIfRouted;
        let config = SystemConfig::default();

        let context = ExecutionContext {
            owner: "0xowner",
            max_slippage_bps: 50,
            urgency: Urgency::Normal,
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
            store,
            cancellation: CancellationToken::new(),
            now_ms: 0,
        };

        let err = TxExecutor::execute("sig-2", &sample_step(), &context, &audit_store).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Reverted(_)));
        assert_eq!(err.kind(), ErrorKind::Reverted);
    }

    #[tokio::test]
    async fn a_cancelled_token_aborts_before_any_chain_call() {
        let store: Arc<dyn TxRecordStore> = Arc::new(InMemoryStore::new());
        let audit_store = InMemoryStore::new();
        let vault = sample_vault();
        let nonce_manager = NonceManager::new(ZeroNonceSource);
        let simulator = SucceedingSimulator;
        let signer = NoopSigner;
        let submitter = ImmediateSubmitter;
        let route_submitter = PanicsIfRouted;
        let config = SystemConfig::default();
        let cancellation = CancellationToken::new();
        cancellation.cancel();

        let context = ExecutionContext {
            owner: "0xowner",
            max_slippage_bps: 50,
            urgency: Urgency::Normal,
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
            store,
            cancellation,
            now_ms: 0,
        };

        let err = TxExecutor::execute("sig-3", &sample_step(), &context, &audit_store).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Cancelled));
    }

    #[tokio::test]
    async fn estimated_output_short_of_the_quote_past_tolerance_is_rejected() {
        let store: Arc<dyn TxRecordStore> = Arc::new(InMemoryStore::new());
        let audit_store = InMemoryStore::new();
        let vault = sample_vault();
        let nonce_manager = NonceManager::new(ZeroNonceSource);
        let simulator = SlippingSimulator;
        let signer = NoopSigner;
        let submitter = ImmediateSubmitter;
        let route_submitter = PanicsIfRouted;
        let config = SystemConfig::default();

        let mut step = sample_step();
        step.quoted_amount_out = Some(Decimal::new(1000, 0));

        let context = ExecutionContext {
            owner: "0xowner",
            max_slippage_bps: 50,
            urgency: Urgency::Normal,
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
            store,
            cancellation: CancellationToken::new(),
            now_ms: 0,
        };

        let err = TxExecutor::execute("sig-slip", &step, &context, &audit_store).await.unwrap_err();
        assert!(matches!(err, ExecutionError::SlippageExceeded { .. }));
        assert_eq!(err.kind(), ErrorKind::SlippageExceeded);
    }

    #[tokio::test]
    async fn a_nonce_rejection_resets_the_cache_and_retries_once() {
        let store: Arc<dyn TxRecordStore> = Arc::new(InMemoryStore::new());
        let audit_store = InMemoryStore::new();
        let vault = sample_vault();
        let fetches = Arc::new(AtomicU32::new(0));
        let nonce_manager = NonceManager::new(CountingNonceSource { fetches: fetches.clone() });
        let simulator = SucceedingSimulator;
        let signer = NoopSigner;
        let submitter = FlakyNonceSubmitter {
            attempts_before_success: 1,
            calls: AtomicU32::new(0),
            resets_observed: Arc::new(AtomicU32::new(0)),
        };
        let route_submitter = PanicsIfRouted;
        let config = SystemConfig::default();

        let context = ExecutionContext {
            owner: "0xowner",
            max_slippage_bps: 50,
            urgency: Urgency::Normal,
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
            store,
            cancellation: CancellationToken::new(),
            now_ms: 0,
        };

        let record = TxExecutor::execute("sig-nonce", &sample_step(), &context, &audit_store).await.unwrap();
        assert_eq!(record.status, TxStatus::Confirmed);
        // one fetch to seed the cache for the first (rejected) attempt, one more
        // after NonceManager::reset for the retried attempt.
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn a_persistently_failing_submission_gives_up_after_max_retries() {
        let store: Arc<dyn TxRecordStore> = Arc::new(InMemoryStore::new());
        let audit_store = InMemoryStore::new();
        let vault = sample_vault();
        let nonce_manager = NonceManager::new(ZeroNonceSource);
        let simulator = SucceedingSimulator;
        let signer = NoopSigner;
        let submitter = AlwaysFailingSubmitter { calls: AtomicU32::new(0) };
        let route_submitter = PanicsIfRouted;
        let config = SystemConfig::default();

        let context = ExecutionContext {
            owner: "0xowner",
            max_slippage_bps: 50,
            urgency: Urgency::Normal,
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
            store,
            cancellation: CancellationToken::new(),
            now_ms: 0,
        };

        let err = TxExecutor::execute("sig-fail", &sample_step(), &context, &audit_store).await.unwrap_err();
        assert!(matches!(err, ExecutionError::SubmissionFailed(_)));
    }

    #[tokio::test]
    async fn autopilot_dry_run_plans_and_audits_without_submitting() {
        let store: Arc<dyn TxRecordStore> = Arc::new(InMemoryStore::new());
        let audit_store = InMemoryStore::new();
        let vault = sample_vault();
        let nonce_manager = NonceManager::new(ZeroNonceSource);
        let simulator = SucceedingSimulator;
        let signer = NoopSigner;
        let submitter = AlwaysFailingSubmitter { calls: AtomicU32::new(0) };
        let route_submitter = PanicsIfRouted;
        let mut config = SystemConfig::default();
        config.autopilot_dry_run = true;

        let context = ExecutionContext {
            owner: "0xowner",
            max_slippage_bps: 50,
            urgency: Urgency::Normal,
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
            store,
            cancellation: CancellationToken::new(),
            now_ms: 0,
        };

        let record = TxExecutor::execute("sig-dry", &sample_step(), &context, &audit_store).await.unwrap();
        assert_eq!(record.status, TxStatus::Pending);
        assert!(record.tx_hash.is_none());
        // the submitter (which would always fail) was never called
        assert_eq!(submitter.calls.load(Ordering::SeqCst), 0);
        let entries = audit_store.list_for_signal("sig-dry").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event_type, "dry_run_planned");
    }
}
