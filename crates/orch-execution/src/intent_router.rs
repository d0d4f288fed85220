//! Submission-path selection (`spec.md` §4.6, C6) — the core design problem this
//! crate exists to solve: picking MEV-protected/private-relay/batch-auction
//! submission over a blind `eth_sendRawTransaction` when the chain, size, and
//! urgency of a step warrant it.
//!
//! [`IntentRouter::choose_method`] is the pure decision table (testable property
//! P7: same `(chain, amountUsd, urgency, config)` always yields the same method).
//! [`IntentRouter::route`] wraps it: for `direct` it returns immediately, for
//! anything else it hands the payload to a [`RouteSubmitter`], which performs that
//! route's own signing and submission (permit2 for UniswapX, an EIP-712 order hash
//! for CoW) and reports back a single canonical [`RouteDecision`].

use async_trait::async_trait;
use orch_types::chain::{chain_meta, ChainFamily, ChainId};
use orch_types::config::SystemConfig;
use orch_types::payload::TxPayload;
use orch_types::record::TxStatus;
use orch_types::signal::Urgency;
use rust_decimal::Decimal;

/// One of the submission paths `spec.md` §4.6 picks between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMethod {
    Direct,
    MevBlocker,
    FlashbotsProtect,
    CowProtocol,
    Uniswapx,
    OneInchFusion,
    Jupiter,
}

impl RouteMethod {
    pub fn is_direct(self) -> bool {
        matches!(self, RouteMethod::Direct)
    }
}

/// What a route (or the `direct` path) surfaces back to the executor, mirroring
/// `spec.md` §4.6's `submit(payload, wallet) → {method, orderId?, txHash?, status,
/// mevProtection, error?}` (the `error?` case is carried as `Err(String)` instead of
/// a field, matching every other submission seam in this crate).
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDecision {
    pub method: RouteMethod,
    pub order_id: Option<String>,
    pub tx_hash: Option<String>,
    pub status: TxStatus,
    pub mev_protection: bool,
}

/// Implemented once per non-direct route (CoW, UniswapX, 1inch Fusion, Flashbots
/// Protect, MEV Blocker, Jupiter): signs and submits `payload` however that route
/// requires — its own order format, its own relay — and reports back a
/// [`RouteDecision`]. The `direct` path never calls this; it falls through to
/// [`crate::tx_executor::TxExecutor`]'s ordinary nonce/sign/submit steps instead.
#[async_trait]
pub trait RouteSubmitter: Send + Sync {
    async fn submit_via_route(
        &self,
        method: RouteMethod,
        chain_id: &ChainId,
        owner: &str,
        payload: &TxPayload,
    ) -> Result<RouteDecision, String>;
}

fn network_name(chain_id: &ChainId) -> Option<&'static str> {
    chain_meta(chain_id).map(|meta| meta.network_name)
}

fn is_ethereum(chain_id: &ChainId) -> bool {
    network_name(chain_id) == Some("ethereum")
}

/// The L2 set `spec.md` groups together for the CoW/UniswapX/1inch-Fusion rows.
fn is_cow_uniswapx_l2(chain_id: &ChainId) -> bool {
    matches!(network_name(chain_id), Some("arbitrum" | "base" | "optimism" | "polygon"))
}

/// `spec.md` doesn't say where "cow supported"/"fusion key set" are read from.
/// Reused here as an explicit presence check against `swap_aggregator_whitelist`
/// (empty ⇒ neither is configured) rather than inventing a new config key — an
/// operator opts an aggregator in through the same field `PolicyGate` checks.
fn aggregator_configured(config: &SystemConfig, name: &str) -> bool {
    config.swap_aggregator_whitelist.iter().any(|a| a == name)
}

pub struct IntentRouter;

impl IntentRouter {
    /// The literal `spec.md` §4.6 table, evaluated top-to-bottom; the first matching
    /// row wins. Pure: no I/O, no `self`, depends only on its arguments.
    pub fn choose_method(chain_id: &ChainId, amount_usd: Decimal, urgency: Urgency, config: &SystemConfig) -> RouteMethod {
        if chain_id.family() == Some(ChainFamily::Solana) {
            return RouteMethod::Jupiter;
        }
        if chain_id.family() == Some(ChainFamily::Aptos) {
            return RouteMethod::Direct;
        }

        let ethereum = is_ethereum(chain_id);
        let l2 = is_cow_uniswapx_l2(chain_id);

        if ethereum && urgency == Urgency::High {
            return RouteMethod::FlashbotsProtect;
        }
        if ethereum && amount_usd > Decimal::new(5_000, 0) {
            return RouteMethod::CowProtocol;
        }
        if l2 && amount_usd > Decimal::new(2_000, 0) && aggregator_configured(config, "cow_protocol") {
            return RouteMethod::CowProtocol;
        }
        if l2 && aggregator_configured(config, "1inch_fusion") {
            return RouteMethod::OneInchFusion;
        }
        if ethereum && amount_usd > Decimal::new(500, 0) {
            return RouteMethod::MevBlocker;
        }
        if l2 && amount_usd > Decimal::new(1_000, 0) {
            return RouteMethod::Uniswapx;
        }
        RouteMethod::Direct
    }

    /// Picks a method, then for anything other than `direct` delegates submission
    /// end-to-end to `route_submitter` (`spec.md` §4.8 step 4). The caller's own
    /// nonce/sign/submit path only ever runs for `direct`.
    pub async fn route(
        chain_id: &ChainId,
        owner: &str,
        amount_usd: Decimal,
        urgency: Urgency,
        config: &SystemConfig,
        payload: &TxPayload,
        route_submitter: &dyn RouteSubmitter,
    ) -> Result<RouteDecision, String> {
        let method = Self::choose_method(chain_id, amount_usd, urgency, config);
        if method.is_direct() {
            return Ok(RouteDecision {
                method,
                order_id: None,
                tx_hash: None,
                status: TxStatus::Pending,
                mev_protection: false,
            });
        }

        let mut decision = route_submitter.submit_via_route(method, chain_id, owner, payload).await?;
        decision.mev_protection = true;
        Ok(decision)
    }
}
