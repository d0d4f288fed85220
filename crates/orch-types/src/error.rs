//! The shared error taxonomy every component classifies its failures into.
//!
//! Components raise their own `thiserror` enums (see `orch-execution`/`orch-dispatch`),
//! each exposing a `kind() -> ErrorKind` method so the executor's single terminal
//! handler can decide retry/abort/escalate behavior without matching on every
//! component's concrete error type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse classification of a failure, used to decide whether a step is retried,
/// parked as a `PendingSignature`, marked `Failed`, or escalated to an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Misconfiguration: missing RPC URL, unparseable signer, unknown chain.
    Config,
    /// A policy-gate rule rejected the signal/step outright; not retryable.
    PolicyRejection,
    /// Network/RPC hiccup: timeout, connection reset, rate limit. Retryable.
    RpcTransient,
    /// On-chain nonce collided with another in-flight transaction. Retry with reseed.
    NonceMismatch,
    /// The funding wallet lacks the balance required for the step.
    InsufficientBalance,
    /// The gas budget computed for the step (simulated cost × multiplier) exceeds
    /// what the signal/config allows. Retryable: a later attempt may land once the
    /// chain's base fee has moved.
    InsufficientGasBudget,
    /// Simulated or realized slippage exceeded the signal's tolerance.
    SlippageExceeded,
    /// The transaction simulated fine but reverted once it reached a validator/node.
    Reverted,
    /// Simulation itself failed to execute (not a revert — a malformed call).
    SimulationFailed,
    /// No hot key: step parked in `PendingSignature`, not an error path.
    AwaitingSignature,
    /// A confirmation or simulation deadline elapsed.
    Timeout,
    /// A bridge leg failed after funds left the source chain; refundable via the
    /// bridge's own recovery path, not retryable by resubmitting the same step.
    BridgeRefundable,
}

impl ErrorKind {
    /// Whether the executor should retry the step with backoff, as opposed to
    /// marking it `Failed`/`Rejected` or parking it. Mirrors `spec.md` §4.8's retry
    /// paragraph exactly: `Timeout` is excluded on purpose — a confirmation timeout
    /// is surfaced as `FAILED{timeout}` for a human to manually re-submit, not
    /// retried automatically.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::RpcTransient | ErrorKind::NonceMismatch | ErrorKind::InsufficientGasBudget
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Config => "config",
            ErrorKind::PolicyRejection => "policy_rejection",
            ErrorKind::RpcTransient => "rpc_transient",
            ErrorKind::NonceMismatch => "nonce_mismatch",
            ErrorKind::InsufficientBalance => "insufficient_balance",
            ErrorKind::InsufficientGasBudget => "insufficient_gas_budget",
            ErrorKind::SlippageExceeded => "slippage_exceeded",
            ErrorKind::Reverted => "reverted",
            ErrorKind::SimulationFailed => "simulation_failed",
            ErrorKind::AwaitingSignature => "awaiting_signature",
            ErrorKind::Timeout => "timeout",
            ErrorKind::BridgeRefundable => "bridge_refundable",
        };
        f.write_str(s)
    }
}

/// Implemented by every component-level error enum so generic handlers (the
/// executor, the metrics exporter) can classify a failure without a match on its
/// concrete type.
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

/// Severity recorded on an `audit_log` row (`spec.md` §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for AuditSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuditSeverity::Info => "info",
            AuditSeverity::Warning => "warning",
            AuditSeverity::Error => "error",
            AuditSeverity::Critical => "critical",
        };
        f.write_str(s)
    }
}
