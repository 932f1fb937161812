//! Exchange-facing ports: order submission, market info, and on-chain
//! redemption, each behind a trait so the core can be driven by fakes in
//! tests and by the Polymarket adapter in production.

pub mod polymarket;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::core::domain::{ClientOrderId, Fill, Order, OrderBookLevel, OrderId, OrderStatus, Outcome, Side, TokenId};

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("exchange rejected order: {0}")]
    Rejected(String),
    #[error("order {0} not found")]
    NotFound(OrderId),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("timed out waiting for exchange")]
    Timeout,
}

pub type ExchangeResult<T> = Result<T, ExchangeError>;

#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub client_order_id: ClientOrderId,
    pub token_id: TokenId,
    pub side: Side,
    pub outcome: Outcome,
    pub size: Decimal,
    pub price: Decimal,
    pub order_type: crate::core::domain::OrderType,
}

/// A point-in-time view of an order as reported by the exchange.
#[derive(Debug, Clone)]
pub struct OrderSnapshot {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub filled_size: Decimal,
    pub fills: Vec<Fill>,
}

/// Typed port over the exchange's order entry API. One implementation
/// per venue; the execution engine never talks to `reqwest` directly.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    async fn submit_order(&self, request: &OrderRequest) -> ExchangeResult<OrderSnapshot>;
    async fn poll_order(&self, order_id: &OrderId) -> ExchangeResult<OrderSnapshot>;
    async fn cancel_order(&self, order_id: &OrderId) -> ExchangeResult<()>;
    /// Best bid/ask for a token, used for unwind and rebalance pricing.
    async fn top_of_book(&self, token_id: &TokenId) -> ExchangeResult<(Option<Decimal>, Option<Decimal>)>;
}

/// Resolution state of a binary market, as reported by the venue's
/// market-info API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketResolution {
    Unresolved,
    Resolved(Outcome),
}

#[async_trait]
pub trait MarketInfoSource: Send + Sync {
    async fn resolution(&self, condition_id: &crate::core::domain::ConditionId) -> ExchangeResult<MarketResolution>;
}

#[derive(Debug, Clone)]
pub struct RedemptionReceipt {
    pub success: bool,
    pub tx_hash: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// On-chain redemption client: claims payouts for resolved conditional
/// tokens. Kept as a narrow trait so the settlement manager never
/// depends on a concrete chain client.
#[async_trait]
pub trait RedemptionClient: Send + Sync {
    async fn redeem(
        &self,
        condition_id: &crate::core::domain::ConditionId,
        token_id: &TokenId,
    ) -> ExchangeResult<RedemptionReceipt>;
}

/// One update off the exchange's real-time feed for a single token.
/// A price-only update carries best bid/ask without depth; a book
/// snapshot replaces a side's full depth atomically.
#[derive(Debug, Clone)]
pub enum MarketEvent {
    PriceUpdate {
        token_id: TokenId,
        best_bid: Option<Decimal>,
        best_ask: Option<Decimal>,
    },
    BookSnapshot {
        token_id: TokenId,
        bids: Vec<OrderBookLevel>,
        asks: Vec<OrderBookLevel>,
    },
}

/// Exchange real-time data feed, owned exclusively by the market data
/// service. One implementation per venue (WebSocket, in practice);
/// tests drive the service with a scripted fake.
#[async_trait]
pub trait MarketDataFeed: Send {
    async fn subscribe(&mut self, yes_token_id: &TokenId, no_token_id: &TokenId) -> ExchangeResult<()>;
    async fn unsubscribe(&mut self, yes_token_id: &TokenId, no_token_id: &TokenId) -> ExchangeResult<()>;
    /// Blocks until the next event or the feed closes.
    async fn next_event(&mut self) -> Option<MarketEvent>;
}

/// Exchange-specific constants: payout-per-winning-share and outcome
/// naming, the values settlement math needs downstream of a venue
/// adapter.
pub trait ExchangeConfig: Send + Sync {
    fn name(&self) -> &'static str;
    fn default_payout(&self) -> Decimal;
}

pub use self::order_helpers::build_dual_leg_requests;

mod order_helpers {
    use super::{ExchangeError, OrderRequest};
    use crate::core::domain::{ClientOrderId, MarketOrderBook, OrderType, Outcome, Side};
    use rust_decimal::Decimal;

    /// Build the YES-BUY and NO-BUY order requests for a dual-leg
    /// arbitrage execution, sized per-leg in shares.
    pub fn build_dual_leg_requests(
        book: &MarketOrderBook,
        yes_shares: Decimal,
        no_shares: Decimal,
        yes_price: Decimal,
        no_price: Decimal,
    ) -> Result<(OrderRequest, OrderRequest), ExchangeError> {
        if yes_shares <= Decimal::ZERO || no_shares <= Decimal::ZERO {
            return Err(ExchangeError::Rejected("non-positive leg size".to_string()));
        }
        let yes = OrderRequest {
            client_order_id: ClientOrderId::generate(),
            token_id: book.yes_book.token_id().clone(),
            side: Side::Buy,
            outcome: Outcome::Yes,
            size: yes_shares,
            price: yes_price,
            order_type: OrderType::Fok,
        };
        let no = OrderRequest {
            client_order_id: ClientOrderId::generate(),
            token_id: book.no_book.token_id().clone(),
            side: Side::Buy,
            outcome: Outcome::No,
            size: no_shares,
            price: no_price,
            order_type: OrderType::Fok,
        };
        Ok((yes, no))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{InMemoryOrderBook, MarketId, MarketOrderBook, TokenId};
    use rust_decimal_macros::dec;

    #[test]
    fn build_dual_leg_requests_rejects_non_positive_size() {
        let yes = InMemoryOrderBook::new(TokenId::new("yes"));
        let no = InMemoryOrderBook::new(TokenId::new("no"));
        let book = MarketOrderBook::new(MarketId::new("m1"), yes, no);
        let result = build_dual_leg_requests(&book, dec!(0), dec!(1), dec!(0.45), dec!(0.5));
        assert!(result.is_err());
    }

    #[test]
    fn build_dual_leg_requests_produces_buy_orders() {
        let yes = InMemoryOrderBook::new(TokenId::new("yes"));
        let no = InMemoryOrderBook::new(TokenId::new("no"));
        let book = MarketOrderBook::new(MarketId::new("m1"), yes, no);
        let (yes_req, no_req) = build_dual_leg_requests(&book, dec!(10), dec!(10), dec!(0.45), dec!(0.5)).unwrap();
        assert_eq!(yes_req.outcome, Outcome::Yes);
        assert_eq!(no_req.outcome, Outcome::No);
        assert_eq!(yes_req.side, Side::Buy);
    }
}
