//! Fixed-point money types.
//!
//! Prices, sizes and monetary amounts are always `rust_decimal::Decimal`;
//! floating point never touches accounting paths. `Price` and `Size` are
//! aliases rather than newtypes so arithmetic composes with the rest of
//! the `rust_decimal` ecosystem without a forest of wrapper impls.

use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy;

/// A price in `[0, 1]` (binary-market share price).
pub type Price = Decimal;

/// A non-negative share quantity.
pub type Size = Decimal;

/// A non-negative USD amount.
pub type Usd = Decimal;

/// Order sizes are quantized to two fractional digits, truncated toward
/// zero, at the order-submission boundary.
#[must_use]
pub fn quantize_size(size: Size) -> Size {
    size.round_dp_with_strategy(2, RoundingStrategy::ToZero)
}

/// Balances are quantized to six fractional digits.
#[must_use]
pub fn quantize_usd(amount: Usd) -> Usd {
    amount.round_dp_with_strategy(6, RoundingStrategy::ToZero)
}

/// A price is valid only in the open interval `(0, 1)`; exchange prices
/// at exactly 0 or 1 are rejected by the data model.
#[must_use]
pub fn is_valid_price(price: Price) -> bool {
    price > Decimal::ZERO && price < Decimal::ONE
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn quantize_size_truncates_toward_zero() {
        assert_eq!(quantize_size(dec!(1.239)), dec!(1.23));
        assert_eq!(quantize_size(dec!(-1.239)), dec!(-1.23));
    }

    #[test]
    fn valid_price_excludes_boundaries() {
        assert!(!is_valid_price(dec!(0)));
        assert!(!is_valid_price(dec!(1)));
        assert!(is_valid_price(dec!(0.0001)));
        assert!(is_valid_price(dec!(0.9999)));
    }
}
