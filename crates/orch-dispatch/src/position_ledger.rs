//! Position bookkeeping (`spec.md` §4.13): the ledger applies `DEPOSIT`/`WITHDRAW`
//! confirmations to position rows, and a periodic reconciler re-prices every active
//! position, falling back to an APR-based PnL estimate when a live balance read
//! isn't available.

use async_trait::async_trait;
use orch_store::store::{PositionStore, StoreError};
use orch_types::money;
use orch_types::position::{Position, PositionStatus};
use rust_decimal::Decimal;
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no position {0}")]
    NotFound(String),
}

pub struct PositionLedger;

impl PositionLedger {
    /// Opens a fresh position, or tops up an existing one, on a confirmed
    /// `DEPOSIT`. `entry_value_usd = value_usd = usd_value` the first time a
    /// position is opened.
    pub async fn on_deposit_confirmed(
        store: &dyn PositionStore,
        position_id: &str,
        owner: &str,
        chain_id: orch_types::chain::ChainId,
        protocol_id: &str,
        usd_value: Decimal,
        now_ms: i64,
    ) -> Result<Position, LedgerError> {
        let position = match store.get(position_id).await? {
            Some(mut existing) => {
                existing.principal_usd += usd_value;
                existing.status = PositionStatus::Active;
                existing
            }
            None => Position {
                position_id: position_id.to_string(),
                owner: owner.to_string(),
                chain_id,
                protocol_id: protocol_id.to_string(),
                status: PositionStatus::Active,
                principal_usd: usd_value,
                accrued_yield_usd: Decimal::ZERO,
                opened_at_ms: now_ms,
                closed_at_ms: None,
            },
        };
        store.upsert(position.clone()).await?;
        Ok(position)
    }

    /// Reduces (or closes) a position on a confirmed `WITHDRAW`. Closes the
    /// position outright once the remaining principal is dust relative to what the
    /// position was worth just before this withdrawal.
    pub async fn on_withdraw_confirmed(
        store: &dyn PositionStore,
        position_id: &str,
        withdrawn_usd: Decimal,
        now_ms: i64,
    ) -> Result<Position, LedgerError> {
        let mut position = store
            .get(position_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(position_id.to_string()))?;

        let total_before = position.value_usd();
        let remaining_principal = (position.principal_usd - withdrawn_usd).max(Decimal::ZERO);

        if money::is_dust(remaining_principal, total_before) {
            position.principal_usd = Decimal::ZERO;
            position.accrued_yield_usd = Decimal::ZERO;
            position.status = PositionStatus::Closed;
            position.closed_at_ms = Some(now_ms);
        } else {
            position.principal_usd = remaining_principal;
        }

        store.upsert(position.clone()).await?;
        Ok(position)
    }
}

/// Supplies a position's current on-chain value when the adapter can read it
/// directly. `None` signals the reconciler should fall back to the APR estimator.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn read_value_usd(&self, position: &Position) -> Option<Decimal>;
}

/// A point-in-time valuation, written for PnL charting each reconciliation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSnapshot {
    pub position_id: String,
    pub value_usd: Decimal,
    pub unrealized_pnl_usd: Decimal,
    pub at_ms: i64,
    /// `true` if this snapshot came from the APR estimator rather than a live
    /// balance read.
    pub estimated: bool,
}

pub struct PositionReconciler;

impl PositionReconciler {
    /// One reconciliation pass (intended to run every 5 minutes) over every active
    /// position belonging to `owners`. `apr_percent` supplies the protocol's
    /// advertised APR (e.g. `12` for 12%) for positions `balances` can't price
    /// directly; positions with neither a balance read nor an APR entry are left
    /// unchanged and get no snapshot.
    pub async fn reconcile(
        store: &dyn PositionStore,
        balances: &dyn BalanceSource,
        apr_percent: &HashMap<String, Decimal>,
        owners: &[String],
        now_ms: i64,
    ) -> Result<Vec<PositionSnapshot>, LedgerError> {
        let mut snapshots = Vec::new();
        for owner in owners {
            for mut position in store.list_by_owner(owner).await? {
                if position.status != PositionStatus::Active {
                    continue;
                }

                let snapshot = if let Some(value_usd) = balances.read_value_usd(&position).await {
                    position.accrued_yield_usd = value_usd - position.principal_usd;
                    Some(PositionSnapshot {
                        position_id: position.position_id.clone(),
                        value_usd,
                        unrealized_pnl_usd: position.accrued_yield_usd,
                        at_ms: now_ms,
                        estimated: false,
                    })
                } else if let Some(apr) = apr_percent.get(&position.protocol_id) {
                    let pnl = Self::estimate_pnl(position.principal_usd, *apr, position.opened_at_ms, now_ms);
                    position.accrued_yield_usd = pnl;
                    Some(PositionSnapshot {
                        position_id: position.position_id.clone(),
                        value_usd: position.principal_usd + pnl,
                        unrealized_pnl_usd: pnl,
                        at_ms: now_ms,
                        estimated: true,
                    })
                } else {
                    None
                };

                if let Some(snapshot) = snapshot {
                    store.upsert(position).await?;
                    snapshots.push(snapshot);
                }
            }
        }
        Ok(snapshots)
    }

    /// `pnl = entryValue × apr/100 × holdingDays/365`, signed (a negative APR or a
    /// position opened after `now_ms` yields a negative/zero PnL rather than erroring).
    fn estimate_pnl(entry_value_usd: Decimal, apr_percent: Decimal, opened_at_ms: i64, now_ms: i64) -> Decimal {
        let holding_days = Decimal::new((now_ms - opened_at_ms).max(0), 0) / Decimal::new(86_400_000, 0);
        entry_value_usd * (apr_percent / Decimal::new(100, 0)) * (holding_days / Decimal::new(365, 0))
    }
}
