//! Market data service: owns the exchange's real-time feed, keeps a
//! per-market [`MarketOrderBook`], republishes updates on the event
//! bus, and watches for staleness.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::core::bus::EventBus;
use crate::core::domain::{InMemoryOrderBook, MarketId, MarketOrderBook, OrderBookLevel, TokenId};
use crate::core::exchange::{ExchangeResult, MarketDataFeed, MarketEvent};

fn default_stale_threshold_seconds() -> i64 {
    30
}
fn default_stale_check_interval_seconds() -> u64 {
    10
}
/// Size assumed for a price-only update, which carries no depth
/// information.
fn default_price_update_size() -> Decimal {
    rust_decimal_macros::dec!(100)
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketDataConfig {
    #[serde(default = "default_stale_threshold_seconds")]
    pub stale_threshold_seconds: i64,
    #[serde(default = "default_stale_check_interval_seconds")]
    pub stale_check_interval_seconds: u64,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            stale_threshold_seconds: default_stale_threshold_seconds(),
            stale_check_interval_seconds: default_stale_check_interval_seconds(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BestPrices {
    pub yes_bid: Option<Decimal>,
    pub yes_ask: Option<Decimal>,
    pub no_bid: Option<Decimal>,
    pub no_ask: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ArbitrageInfo {
    pub combined_ask: Option<Decimal>,
    pub spread: Option<Decimal>,
    pub has_arbitrage: bool,
}

/// Published on `market.orderbook.<market_id>` after every update.
#[derive(Debug, Clone)]
pub struct OrderBookUpdate {
    pub market_id: MarketId,
    pub best_prices: BestPrices,
    pub arbitrage: ArbitrageInfo,
}

struct MarketState {
    yes_token_id: TokenId,
    no_token_id: TokenId,
    book: MarketOrderBook,
    last_yes_update: chrono::DateTime<Utc>,
    last_no_update: chrono::DateTime<Utc>,
}

pub struct MarketDataService {
    config: MarketDataConfig,
    bus: EventBus,
    feed: AsyncMutex<Box<dyn MarketDataFeed>>,
    markets: RwLock<HashMap<MarketId, MarketState>>,
    token_to_market: RwLock<HashMap<TokenId, MarketId>>,
}

impl MarketDataService {
    #[must_use]
    pub fn new(config: MarketDataConfig, bus: EventBus, feed: Box<dyn MarketDataFeed>) -> Self {
        Self {
            config,
            bus,
            feed: AsyncMutex::new(feed),
            markets: RwLock::new(HashMap::new()),
            token_to_market: RwLock::new(HashMap::new()),
        }
    }

    pub async fn subscribe_market(
        &self,
        market_id: MarketId,
        yes_token_id: TokenId,
        no_token_id: TokenId,
    ) -> ExchangeResult<()> {
        self.feed.lock().await.subscribe(&yes_token_id, &no_token_id).await?;
        let now = Utc::now();
        let yes_book = InMemoryOrderBook::new(yes_token_id.clone());
        let no_book = InMemoryOrderBook::new(no_token_id.clone());
        self.token_to_market.write().insert(yes_token_id.clone(), market_id.clone());
        self.token_to_market.write().insert(no_token_id.clone(), market_id.clone());
        self.markets.write().insert(
            market_id.clone(),
            MarketState {
                yes_token_id,
                no_token_id,
                book: MarketOrderBook::new(market_id.clone(), yes_book, no_book),
                last_yes_update: now,
                last_no_update: now,
            },
        );
        info!(market_id = market_id.as_str(), "subscribed market");
        Ok(())
    }

    pub async fn unsubscribe_market(&self, market_id: &MarketId) -> ExchangeResult<()> {
        let removed = self.markets.write().remove(market_id);
        if let Some(state) = removed {
            self.feed.lock().await.unsubscribe(&state.yes_token_id, &state.no_token_id).await?;
            self.token_to_market.write().remove(&state.yes_token_id);
            self.token_to_market.write().remove(&state.no_token_id);
        }
        Ok(())
    }

    #[must_use]
    pub fn get_best_prices(&self, market_id: &MarketId) -> Option<BestPrices> {
        let markets = self.markets.read();
        let state = markets.get(market_id)?;
        Some(BestPrices {
            yes_bid: state.book.yes_book.best_bid().map(|l| l.price),
            yes_ask: state.book.yes_book.best_ask().map(|l| l.price),
            no_bid: state.book.no_book.best_bid().map(|l| l.price),
            no_ask: state.book.no_book.best_ask().map(|l| l.price),
        })
    }

    /// Full snapshot of a market's book, for callers (the strategy
    /// engine) that need more than the summarized best-price view.
    #[must_use]
    pub fn get_book(&self, market_id: &MarketId) -> Option<MarketOrderBook> {
        self.markets.read().get(market_id).map(|state| state.book.clone())
    }

    #[must_use]
    pub fn get_depth(&self, market_id: &MarketId, n: usize) -> Option<(Vec<OrderBookLevel>, Vec<OrderBookLevel>)> {
        let markets = self.markets.read();
        let state = markets.get(market_id)?;
        Some((state.book.yes_book.ask_depth(n), state.book.no_book.ask_depth(n)))
    }

    #[must_use]
    pub fn get_arbitrage_info(&self, market_id: &MarketId) -> Option<ArbitrageInfo> {
        let markets = self.markets.read();
        let state = markets.get(market_id)?;
        Some(ArbitrageInfo {
            combined_ask: state.book.combined_ask(),
            spread: state.book.arbitrage_spread(),
            has_arbitrage: state.book.has_arbitrage(),
        })
    }

    #[must_use]
    pub fn is_market_stale(&self, market_id: &MarketId, now: chrono::DateTime<Utc>) -> Option<bool> {
        let markets = self.markets.read();
        let state = markets.get(market_id)?;
        let last = state.last_yes_update.max(state.last_no_update);
        Some((now - last).num_seconds() > self.config.stale_threshold_seconds)
    }

    /// Pulls events off the feed until it closes, applying each to the
    /// owning market's book and republishing a snapshot.
    pub async fn run_event_loop(self: &Arc<Self>) {
        loop {
            let event = self.feed.lock().await.next_event().await;
            let Some(event) = event else {
                warn!("market data feed closed");
                return;
            };
            self.apply_event(event);
        }
    }

    fn apply_event(&self, event: MarketEvent) {
        let (token_id, market_id) = match &event {
            MarketEvent::PriceUpdate { token_id, .. } | MarketEvent::BookSnapshot { token_id, .. } => {
                let market_id = self.token_to_market.read().get(token_id).cloned();
                (token_id.clone(), market_id)
            }
        };
        let Some(market_id) = market_id else {
            debug!(token_id = token_id.as_str(), "event for unsubscribed token");
            return;
        };

        let now = Utc::now();
        let mut markets = self.markets.write();
        let Some(state) = markets.get_mut(&market_id) else {
            return;
        };
        let is_yes = state.yes_token_id == token_id;
        let book = if is_yes { &mut state.book.yes_book } else { &mut state.book.no_book };

        match event {
            MarketEvent::PriceUpdate { best_bid, best_ask, .. } => {
                let size = default_price_update_size();
                if let Some(bid) = best_bid {
                    book.update_bid(bid, size);
                }
                if let Some(ask) = best_ask {
                    book.update_ask(ask, size);
                }
            }
            MarketEvent::BookSnapshot { bids, asks, .. } => {
                book.apply_snapshot(&bids, &asks);
            }
        }

        if is_yes {
            state.last_yes_update = now;
        } else {
            state.last_no_update = now;
        }

        let update = OrderBookUpdate {
            market_id: market_id.clone(),
            best_prices: BestPrices {
                yes_bid: state.book.yes_book.best_bid().map(|l| l.price),
                yes_ask: state.book.yes_book.best_ask().map(|l| l.price),
                no_bid: state.book.no_book.best_bid().map(|l| l.price),
                no_ask: state.book.no_book.best_ask().map(|l| l.price),
            },
            arbitrage: ArbitrageInfo {
                combined_ask: state.book.combined_ask(),
                spread: state.book.arbitrage_spread(),
                has_arbitrage: state.book.has_arbitrage(),
            },
        };
        drop(markets);
        self.bus.publish(&format!("market.orderbook.{}", market_id.as_str()), update);
    }

    /// Periodic background task emitting `market.stale.<market_id>`
    /// for markets whose books haven't updated within the threshold.
    pub async fn run_stale_monitor(self: Arc<Self>) {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(self.config.stale_check_interval_seconds));
        loop {
            interval.tick().await;
            let now = Utc::now();
            let stale_ids: Vec<MarketId> = self
                .markets
                .read()
                .iter()
                .filter(|(_, state)| (now - state.last_yes_update.max(state.last_no_update)).num_seconds() > self.config.stale_threshold_seconds)
                .map(|(id, _)| id.clone())
                .collect();
            for market_id in stale_ids {
                warn!(market_id = market_id.as_str(), "market is stale");
                self.bus.publish(&format!("market.stale.{}", market_id.as_str()), market_id.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use tokio::sync::Mutex;

    struct FakeFeed {
        queue: Mutex<VecDeque<MarketEvent>>,
    }

    #[async_trait]
    impl MarketDataFeed for FakeFeed {
        async fn subscribe(&mut self, _yes: &TokenId, _no: &TokenId) -> ExchangeResult<()> {
            Ok(())
        }
        async fn unsubscribe(&mut self, _yes: &TokenId, _no: &TokenId) -> ExchangeResult<()> {
            Ok(())
        }
        async fn next_event(&mut self) -> Option<MarketEvent> {
            self.queue.lock().await.pop_front()
        }
    }

    fn service_with(events: Vec<MarketEvent>) -> MarketDataService {
        let feed = FakeFeed {
            queue: Mutex::new(events.into()),
        };
        MarketDataService::new(MarketDataConfig::default(), EventBus::new(), Box::new(feed))
    }

    #[tokio::test]
    async fn price_update_sets_best_bid_ask_at_default_size() {
        let service = service_with(vec![]);
        service
            .subscribe_market(MarketId::new("m1"), TokenId::new("yes"), TokenId::new("no"))
            .await
            .unwrap();
        service.apply_event(MarketEvent::PriceUpdate {
            token_id: TokenId::new("yes"),
            best_bid: Some(dec!(0.40)),
            best_ask: Some(dec!(0.45)),
        });
        let prices = service.get_best_prices(&MarketId::new("m1")).unwrap();
        assert_eq!(prices.yes_bid, Some(dec!(0.40)));
        assert_eq!(prices.yes_ask, Some(dec!(0.45)));
    }

    #[tokio::test]
    async fn book_snapshot_replaces_depth() {
        let service = service_with(vec![]);
        service
            .subscribe_market(MarketId::new("m1"), TokenId::new("yes"), TokenId::new("no"))
            .await
            .unwrap();
        service.apply_event(MarketEvent::BookSnapshot {
            token_id: TokenId::new("yes"),
            bids: vec![OrderBookLevel::new(dec!(0.40), dec!(10))],
            asks: vec![OrderBookLevel::new(dec!(0.45), dec!(10))],
        });
        let (yes_depth, _) = service.get_depth(&MarketId::new("m1"), 10).unwrap();
        assert_eq!(yes_depth, vec![OrderBookLevel::new(dec!(0.45), dec!(10))]);
    }

    #[tokio::test]
    async fn arbitrage_info_reflects_combined_ask() {
        let service = service_with(vec![]);
        service
            .subscribe_market(MarketId::new("m1"), TokenId::new("yes"), TokenId::new("no"))
            .await
            .unwrap();
        service.apply_event(MarketEvent::PriceUpdate {
            token_id: TokenId::new("yes"),
            best_bid: None,
            best_ask: Some(dec!(0.45)),
        });
        service.apply_event(MarketEvent::PriceUpdate {
            token_id: TokenId::new("no"),
            best_bid: None,
            best_ask: Some(dec!(0.50)),
        });
        let info = service.get_arbitrage_info(&MarketId::new("m1")).unwrap();
        assert_eq!(info.combined_ask, Some(dec!(0.95)));
        assert!(info.has_arbitrage);
    }

    #[tokio::test]
    async fn market_is_stale_past_threshold() {
        let service = service_with(vec![]);
        service
            .subscribe_market(MarketId::new("m1"), TokenId::new("yes"), TokenId::new("no"))
            .await
            .unwrap();
        let future = Utc::now() + chrono::Duration::seconds(60);
        assert!(service.is_market_stale(&MarketId::new("m1"), future).unwrap());
        assert!(!service.is_market_stale(&MarketId::new("m1"), Utc::now()).unwrap());
    }

    #[tokio::test]
    async fn get_book_returns_a_clone_of_current_state() {
        let service = service_with(vec![]);
        service
            .subscribe_market(MarketId::new("m1"), TokenId::new("yes"), TokenId::new("no"))
            .await
            .unwrap();
        service.apply_event(MarketEvent::PriceUpdate {
            token_id: TokenId::new("yes"),
            best_bid: None,
            best_ask: Some(dec!(0.45)),
        });
        let book = service.get_book(&MarketId::new("m1")).unwrap();
        assert_eq!(book.yes_book.best_ask().map(|l| l.price), Some(dec!(0.45)));
    }

    #[tokio::test]
    async fn unknown_market_queries_return_none() {
        let service = service_with(vec![]);
        assert!(service.get_best_prices(&MarketId::new("nope")).is_none());
        assert!(service.is_market_stale(&MarketId::new("nope"), Utc::now()).is_none());
    }
}
