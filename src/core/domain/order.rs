//! Orders, fills, and the order lifecycle state machine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{ClientOrderId, FillId, MarketId, OrderId, TokenId};
use super::money::{Price, Size, Usd};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Yes,
    No,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Gtc,
    Fok,
    Limit,
    Market,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Submitted,
    Filled,
    PartiallyFilled,
    Open,
    Rejected,
    Expired,
    Cancelled,
}

impl OrderStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Cancelled | Self::Rejected | Self::Expired
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub client_order_id: ClientOrderId,
    pub market_id: MarketId,
    pub token_id: TokenId,
    pub side: Side,
    pub outcome: Outcome,
    pub requested_size: Size,
    pub filled_size: Size,
    pub price: Price,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[must_use]
    pub fn new(
        order_id: OrderId,
        client_order_id: ClientOrderId,
        market_id: MarketId,
        token_id: TokenId,
        side: Side,
        outcome: Outcome,
        requested_size: Size,
        price: Price,
        order_type: OrderType,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            order_id,
            client_order_id,
            market_id,
            token_id,
            side,
            outcome,
            requested_size,
            filled_size: Decimal::ZERO,
            price,
            order_type,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn remaining_size(&self) -> Size {
        self.requested_size - self.filled_size
    }

    #[must_use]
    pub fn fill_ratio(&self) -> Decimal {
        if self.requested_size.is_zero() {
            Decimal::ZERO
        } else {
            self.filled_size / self.requested_size
        }
    }

    pub fn transition(&mut self, status: OrderStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub fill_id: FillId,
    pub order_id: OrderId,
    pub market_id: MarketId,
    pub token_id: TokenId,
    pub side: Side,
    pub outcome: Outcome,
    pub size: Size,
    pub price: Price,
    pub fee: Usd,
    pub timestamp: DateTime<Utc>,
}

impl Fill {
    #[must_use]
    pub fn cost(&self) -> Usd {
        self.size * self.price + self.fee
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn order() -> Order {
        Order::new(
            OrderId::new("o1"),
            ClientOrderId::new("c1"),
            MarketId::new("m1"),
            TokenId::new("yes"),
            Side::Buy,
            Outcome::Yes,
            dec!(100),
            dec!(0.45),
            OrderType::Gtc,
            now(),
        )
    }

    #[test]
    fn remaining_and_fill_ratio() {
        let mut o = order();
        assert_eq!(o.remaining_size(), dec!(100));
        assert_eq!(o.fill_ratio(), dec!(0));
        o.filled_size = dec!(25);
        assert_eq!(o.remaining_size(), dec!(75));
        assert_eq!(o.fill_ratio(), dec!(0.25));
    }

    #[test]
    fn terminal_states() {
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(OrderStatus::Expired.is_terminal());
        assert!(!OrderStatus::Open.is_terminal());
        assert!(!OrderStatus::PartiallyFilled.is_terminal());
    }

    #[test]
    fn fill_cost_includes_fee() {
        let fill = Fill {
            fill_id: FillId::new("f1"),
            order_id: OrderId::new("o1"),
            market_id: MarketId::new("m1"),
            token_id: TokenId::new("yes"),
            side: Side::Buy,
            outcome: Outcome::Yes,
            size: dec!(10),
            price: dec!(0.45),
            fee: dec!(0.05),
            timestamp: now(),
        };
        assert_eq!(fill.cost(), dec!(4.55));
    }
}
