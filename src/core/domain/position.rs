//! Hedged positions built out of matched YES/NO fills.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{ConditionId, MarketId, PositionId, TokenId};
use super::money::{Price, Size, Usd};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Open,
    Closed,
    PendingSettlement,
    Settled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub position_id: PositionId,
    pub market_id: MarketId,
    pub condition_id: ConditionId,
    pub yes_token_id: TokenId,
    pub no_token_id: TokenId,
    pub yes_size: Size,
    pub no_size: Size,
    pub yes_avg_price: Price,
    pub no_avg_price: Price,
    pub status: PositionStatus,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub realized_pnl: Option<Usd>,
    pub settlement_proceeds: Option<Usd>,
}

impl Position {
    #[must_use]
    pub fn is_hedged(&self) -> bool {
        self.yes_size == self.no_size && self.yes_size > Decimal::ZERO
    }

    #[must_use]
    pub fn net_exposure(&self) -> Decimal {
        self.yes_size - self.no_size
    }

    #[must_use]
    pub fn hedge_ratio(&self) -> Decimal {
        let (min, max) = if self.yes_size <= self.no_size {
            (self.yes_size, self.no_size)
        } else {
            (self.no_size, self.yes_size)
        };
        if max.is_zero() {
            Decimal::ZERO
        } else {
            min / max
        }
    }

    /// Lower bound on realized P&L for a hedged position: the matched
    /// share count pays out 1 each, minus what the matched portion cost.
    #[must_use]
    pub fn guaranteed_pnl(&self) -> Usd {
        let matched = self.yes_size.min(self.no_size);
        let matched_cost = matched * self.yes_avg_price + matched * self.no_avg_price;
        matched - matched_cost
    }

    pub fn close(&mut self, pnl: Usd, now: DateTime<Utc>) {
        self.status = PositionStatus::Closed;
        self.closed_at = Some(now);
        self.realized_pnl = Some(pnl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn position(yes_size: Decimal, no_size: Decimal) -> Position {
        Position {
            position_id: PositionId::new("p1"),
            market_id: MarketId::new("m1"),
            condition_id: ConditionId::new("c1"),
            yes_token_id: TokenId::new("yes"),
            no_token_id: TokenId::new("no"),
            yes_size,
            no_size,
            yes_avg_price: dec!(0.45),
            no_avg_price: dec!(0.50),
            status: PositionStatus::Open,
            opened_at: Utc::now(),
            closed_at: None,
            realized_pnl: None,
            settlement_proceeds: None,
        }
    }

    #[test]
    fn is_hedged_requires_equal_positive_sizes() {
        assert!(position(dec!(22.22), dec!(22.22)).is_hedged());
        assert!(!position(dec!(22.22), dec!(10)).is_hedged());
        assert!(!position(dec!(0), dec!(0)).is_hedged());
    }

    #[test]
    fn net_exposure_and_hedge_ratio() {
        let p = position(dec!(30), dec!(10));
        assert_eq!(p.net_exposure(), dec!(20));
        assert_eq!(p.hedge_ratio(), dec!(10) / dec!(30));
    }

    #[test]
    fn hedge_ratio_zero_when_one_leg_empty() {
        let p = position(dec!(0), dec!(0));
        assert_eq!(p.hedge_ratio(), dec!(0));
    }

    #[test]
    fn guaranteed_pnl_is_matched_minus_matched_cost() {
        let p = position(dec!(22.22), dec!(22.22));
        // matched=22.22, cost = 22.22*0.45 + 22.22*0.50 = 22.22*0.95
        let expected = dec!(22.22) - dec!(22.22) * dec!(0.95);
        assert_eq!(p.guaranteed_pnl(), expected);
    }

    #[test]
    fn close_sets_terminal_fields() {
        let mut p = position(dec!(10), dec!(10));
        let now = Utc::now();
        p.close(dec!(1.11), now);
        assert_eq!(p.status, PositionStatus::Closed);
        assert_eq!(p.closed_at, Some(now));
        assert_eq!(p.realized_pnl, Some(dec!(1.11)));
    }
}
