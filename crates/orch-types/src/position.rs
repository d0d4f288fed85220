//! Open positions the orchestrator is tracking on behalf of an owner wallet.

use crate::chain::ChainId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    Active,
    Closed,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub position_id: String,
    pub owner: String,
    pub chain_id: ChainId,
    pub protocol_id: String,
    pub status: PositionStatus,
    pub principal_usd: Decimal,
    #[serde(default)]
    pub accrued_yield_usd: Decimal,
    pub opened_at_ms: i64,
    #[serde(default)]
    pub closed_at_ms: Option<i64>,
}

impl Position {
    /// Total position value used for dust-threshold and rebalance-sizing checks.
    pub fn value_usd(&self) -> Decimal {
        self.principal_usd + self.accrued_yield_usd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_usd_sums_principal_and_yield() {
        let position = Position {
            position_id: "pos-1".into(),
            owner: "0xowner".into(),
            chain_id: ChainId::new("eip155", "42161"),
            protocol_id: "aave-v3".into(),
            status: PositionStatus::Active,
            principal_usd: Decimal::new(100000, 2),
            accrued_yield_usd: Decimal::new(250, 2),
            opened_at_ms: 0,
            closed_at_ms: None,
        };
        assert_eq!(position.value_usd(), Decimal::new(102500, 2));
    }
}
