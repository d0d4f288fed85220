//! The adapter interface: a flat trait every protocol integration implements, plus
//! optional capability traits for operations not every protocol supports.
//!
//! A lending-market adapter has no swap leg; a DEX adapter has no harvest leg. Rather
//! than one fat trait with default-panic methods (or downcasting through `Any` to
//! discover what a `Box<dyn ProtocolAdapter>` can actually do), each adapter declares
//! its supported operations up front via [`AdapterCapabilities`] and implements only
//! the capability traits it advertises. Callers check the bitset before calling.

use async_trait::async_trait;
use orch_types::chain::ChainFamily;
use orch_types::payload::TxPayload;
use orch_types::plan::StepKind;
use rust_decimal::Decimal;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("{protocol_id} does not support step kind {step_kind:?}")]
    UnsupportedStep { protocol_id: String, step_kind: StepKind },
    #[error("invalid step arguments: {0}")]
    InvalidArguments(String),
    #[error("quote source unavailable: {0}")]
    QuoteUnavailable(String),
}

bitflags::bitflags! {
    /// Which optional capability traits an adapter implements. Checked by callers
    /// before downcasting-free dispatch to `CanSwap`/`CanHarvest`/`CanQuote`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AdapterCapabilities: u8 {
        const SWAP    = 0b0000_0001;
        const HARVEST = 0b0000_0010;
        const QUOTE   = 0b0000_0100;
    }
}

/// Which business category an adapter belongs to, used by the execution planner to
/// pick the default step sequence for an action (e.g. `lending` deposits skip the
/// swap leg a `dex` entry would need).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterCategory {
    Lending,
    Dex,
    Bridge,
}

/// Arguments passed to [`ProtocolAdapter::encode_step`]; deliberately a loose JSON
/// bag rather than a per-protocol struct, since the planner doesn't know each
/// protocol's argument shape — the adapter validates its own inputs.
pub type StepArgs = Value;

/// The operations every protocol integration must implement regardless of category.
#[async_trait]
pub trait ProtocolAdapter: Send + Sync {
    /// Stable identifier used in signals and config (e.g. `"aave-v3"`, `"uniswap-v3"`).
    fn protocol_id(&self) -> &str;
    fn category(&self) -> AdapterCategory;
    fn chain_family(&self) -> ChainFamily;
    fn capabilities(&self) -> AdapterCapabilities;

    /// Encode one plan step into a chain-specific, unsigned transaction payload.
    async fn encode_step(&self, kind: StepKind, args: &StepArgs) -> Result<TxPayload, AdapterError>;
}

/// Protocols that can swap one asset for another (DEXes, aggregators).
#[async_trait]
pub trait CanSwap: ProtocolAdapter {
    async fn quote_swap(
        &self,
        from_token: &str,
        to_token: &str,
        amount_in: Decimal,
    ) -> Result<Decimal, AdapterError>;
}

/// Protocols that accrue claimable rewards separate from principal (yield farms,
/// liquidity mining).
#[async_trait]
pub trait CanHarvest: ProtocolAdapter {
    async fn pending_rewards_usd(&self, position_owner: &str) -> Result<Decimal, AdapterError>;
}

/// Protocols that can price a position or asset without necessarily supporting a
/// swap (e.g. a lending market's supply APY, or a LP token's underlying value).
#[async_trait]
pub trait CanQuote: ProtocolAdapter {
    async fn quote_usd(&self, asset: &str, amount: Decimal) -> Result<Decimal, AdapterError>;
}
