//! Scripted fakes for the exchange-facing ports, shared between this
//! crate's own unit tests and the integration tests under `tests/`.
//! Gated behind the `testkit` feature so production builds never carry
//! it.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::core::domain::{ConditionId, Fill, OrderId, OrderStatus, TokenId};
use crate::core::exchange::{
    ExchangeClient, ExchangeError, ExchangeResult, MarketDataFeed, MarketEvent, MarketInfoSource, MarketResolution,
    OrderRequest, OrderSnapshot, RedemptionClient, RedemptionReceipt,
};

/// Always fills the requested size at the requested price. Records
/// every submitted request for assertions.
pub struct FakeExchangeClient {
    pub submitted: Mutex<Vec<OrderRequest>>,
    pub top_of_book: Mutex<std::collections::HashMap<String, (Option<Decimal>, Option<Decimal>)>>,
    pub reject_next: Mutex<bool>,
}

impl Default for FakeExchangeClient {
    fn default() -> Self {
        Self {
            submitted: Mutex::new(Vec::new()),
            top_of_book: Mutex::new(std::collections::HashMap::new()),
            reject_next: Mutex::new(false),
        }
    }
}

impl FakeExchangeClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_top_of_book(&self, token_id: &TokenId, bid: Option<Decimal>, ask: Option<Decimal>) {
        self.top_of_book.lock().insert(token_id.as_str().to_string(), (bid, ask));
    }

    pub fn reject_next_order(&self) {
        *self.reject_next.lock() = true;
    }

    #[must_use]
    pub fn submitted_count(&self) -> usize {
        self.submitted.lock().len()
    }
}

#[async_trait]
impl ExchangeClient for FakeExchangeClient {
    async fn submit_order(&self, request: &OrderRequest) -> ExchangeResult<OrderSnapshot> {
        if std::mem::take(&mut *self.reject_next.lock()) {
            return Err(ExchangeError::Rejected("fake: rejected by test script".to_string()));
        }
        self.submitted.lock().push(request.clone());
        let order_id = OrderId::generate();
        let fill = Fill {
            fill_id: crate::core::domain::FillId::generate(),
            order_id: order_id.clone(),
            market_id: crate::core::domain::MarketId::new("fake-market"),
            token_id: request.token_id.clone(),
            side: request.side,
            outcome: request.outcome,
            size: request.size,
            price: request.price,
            fee: Decimal::ZERO,
            timestamp: Utc::now(),
        };
        Ok(OrderSnapshot {
            order_id,
            status: OrderStatus::Filled,
            filled_size: request.size,
            fills: vec![fill],
        })
    }

    async fn poll_order(&self, order_id: &OrderId) -> ExchangeResult<OrderSnapshot> {
        Ok(OrderSnapshot {
            order_id: order_id.clone(),
            status: OrderStatus::Filled,
            filled_size: Decimal::ZERO,
            fills: vec![],
        })
    }

    async fn cancel_order(&self, _order_id: &OrderId) -> ExchangeResult<()> {
        Ok(())
    }

    async fn top_of_book(&self, token_id: &TokenId) -> ExchangeResult<(Option<Decimal>, Option<Decimal>)> {
        Ok(self
            .top_of_book
            .lock()
            .get(token_id.as_str())
            .copied()
            .unwrap_or((None, None)))
    }
}

/// Reports a fixed resolution for every condition id.
pub struct FakeMarketInfoSource {
    pub resolution: Mutex<MarketResolution>,
}

impl FakeMarketInfoSource {
    #[must_use]
    pub fn unresolved() -> Self {
        Self {
            resolution: Mutex::new(MarketResolution::Unresolved),
        }
    }

    #[must_use]
    pub fn resolved(outcome: crate::core::domain::Outcome) -> Self {
        Self {
            resolution: Mutex::new(MarketResolution::Resolved(outcome)),
        }
    }

    pub fn set_resolution(&self, resolution: MarketResolution) {
        *self.resolution.lock() = resolution;
    }
}

#[async_trait]
impl MarketInfoSource for FakeMarketInfoSource {
    async fn resolution(&self, _condition_id: &ConditionId) -> ExchangeResult<MarketResolution> {
        Ok(*self.resolution.lock())
    }
}

/// Always succeeds, recording every redeemed `(condition_id, token_id)`
/// pair for assertions.
pub struct FakeRedemptionClient {
    pub claims: Mutex<Vec<(ConditionId, TokenId)>>,
    pub fail_next: Mutex<bool>,
}

impl Default for FakeRedemptionClient {
    fn default() -> Self {
        Self {
            claims: Mutex::new(Vec::new()),
            fail_next: Mutex::new(false),
        }
    }
}

impl FakeRedemptionClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_claim(&self) {
        *self.fail_next.lock() = true;
    }
}

#[async_trait]
impl RedemptionClient for FakeRedemptionClient {
    async fn redeem(&self, condition_id: &ConditionId, token_id: &TokenId) -> ExchangeResult<RedemptionReceipt> {
        if std::mem::take(&mut *self.fail_next.lock()) {
            return Err(ExchangeError::Transport("fake: relay unreachable".to_string()));
        }
        self.claims.lock().push((condition_id.clone(), token_id.clone()));
        Ok(RedemptionReceipt {
            success: true,
            tx_hash: Some("0xfake".to_string()),
            submitted_at: Utc::now(),
        })
    }
}

/// Pre-loaded sequence of events, delivered one per `next_event` call.
/// Subscribe/unsubscribe calls are recorded but never fail; nothing in
/// this crate's scenarios needs a failing subscribe.
#[derive(Default)]
pub struct FakeMarketDataFeed {
    pub events: VecDeque<MarketEvent>,
    pub subscribed: Vec<(TokenId, TokenId)>,
}

impl FakeMarketDataFeed {
    #[must_use]
    pub fn scripted(events: Vec<MarketEvent>) -> Self {
        Self {
            events: events.into(),
            subscribed: Vec::new(),
        }
    }
}

#[async_trait]
impl MarketDataFeed for FakeMarketDataFeed {
    async fn subscribe(&mut self, yes_token_id: &TokenId, no_token_id: &TokenId) -> ExchangeResult<()> {
        self.subscribed.push((yes_token_id.clone(), no_token_id.clone()));
        Ok(())
    }

    async fn unsubscribe(&mut self, _yes_token_id: &TokenId, _no_token_id: &TokenId) -> ExchangeResult<()> {
        Ok(())
    }

    async fn next_event(&mut self) -> Option<MarketEvent> {
        self.events.pop_front()
    }
}

#[must_use]
pub fn boxed_feed(events: Vec<MarketEvent>) -> Box<dyn MarketDataFeed> {
    Box::new(FakeMarketDataFeed::scripted(events))
}

#[must_use]
pub fn arc_exchange() -> Arc<FakeExchangeClient> {
    Arc::new(FakeExchangeClient::new())
}
