//! Dollar-denominated amounts and the dust threshold used across the rebalance and
//! fund-preparation paths.

use rust_decimal::Decimal;
use rust_decimal::prelude::*;

/// A position or transfer below both of these thresholds is dust: not worth the gas
/// cost to move. Both conditions must hold — a relatively large fraction of a tiny
/// position is still not worth acting on if its absolute value is under a cent, and
/// vice versa.
pub const DUST_RELATIVE_THRESHOLD: &str = "0.0001";
pub const DUST_ABSOLUTE_USD: &str = "0.01";

/// True if `amount_usd` relative to `total_usd` is dust by the fixed thresholds.
///
/// `total_usd == 0` is treated as dust (nothing to compare against).
pub fn is_dust(amount_usd: Decimal, total_usd: Decimal) -> bool {
    if total_usd.is_zero() {
        return true;
    }
    let relative = Decimal::from_str(DUST_RELATIVE_THRESHOLD).expect("valid constant");
    let absolute = Decimal::from_str(DUST_ABSOLUTE_USD).expect("valid constant");
    let fraction = amount_usd.abs() / total_usd.abs();
    fraction < relative && amount_usd.abs() < absolute
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiny_absolute_and_relative_amount_is_dust() {
        assert!(is_dust(Decimal::new(1, 4), Decimal::new(100000, 2)));
    }

    #[test]
    fn large_absolute_amount_is_not_dust_even_if_relatively_small() {
        // $50 against a $10m position is a tiny fraction but not dust in absolute terms.
        assert!(!is_dust(Decimal::new(5000, 2), Decimal::new(1_000_000_000, 2)));
    }

    #[test]
    fn zero_total_is_dust() {
        assert!(is_dust(Decimal::new(100, 2), Decimal::ZERO));
    }
}
