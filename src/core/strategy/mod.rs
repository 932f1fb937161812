//! Strategy registry and routing.

pub mod arbitrage;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{error, warn};

use crate::core::bus::EventBus;
use crate::core::domain::{MarketId, MarketOrderBook, TradingSignal};

pub use arbitrage::{ArbitrageConfig, ArbitrageStrategy};

/// A pluggable detection strategy, behind one trait-object interface
/// rather than compile-time generics.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;
    fn enabled(&self) -> bool;
    fn subscribed_markets(&self) -> Vec<MarketId>;
    /// Produce zero or more signals for the given market snapshot.
    fn on_market_data(&self, book: &MarketOrderBook) -> Vec<TradingSignal>;
}

/// Routes `market.orderbook.*` events to every enabled strategy
/// subscribed to that market, and republishes emitted signals on
/// `signal.<strategy_name>`.
pub struct StrategyEngine {
    bus: EventBus,
    strategies: RwLock<HashMap<String, Arc<dyn Strategy>>>,
    market_index: RwLock<HashMap<MarketId, Vec<String>>>,
}

impl StrategyEngine {
    #[must_use]
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            strategies: RwLock::new(HashMap::new()),
            market_index: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, strategy: Arc<dyn Strategy>) {
        let name = strategy.name().to_string();
        for market in strategy.subscribed_markets() {
            self.market_index
                .write()
                .entry(market)
                .or_default()
                .push(name.clone());
        }
        self.strategies.write().insert(name, strategy);
    }

    /// Health is degraded when no strategies are registered or none are
    /// enabled.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        let strategies = self.strategies.read();
        strategies.is_empty() || !strategies.values().any(|s| s.enabled())
    }

    /// Handle one orderbook snapshot: run every enabled strategy
    /// subscribed to this market, publish each signal, and swallow any
    /// per-strategy panic-equivalent error so one bad strategy never
    /// halts the others.
    pub fn handle_market_data(&self, book: &MarketOrderBook) {
        let names = self
            .market_index
            .read()
            .get(&book.market_id)
            .cloned()
            .unwrap_or_default();

        let strategies = self.strategies.read();
        for name in names {
            let Some(strategy) = strategies.get(&name) else {
                continue;
            };
            if !strategy.enabled() {
                continue;
            }
            let signals = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                strategy.on_market_data(book)
            }));
            match signals {
                Ok(signals) => {
                    for signal in signals {
                        if signal.is_expired(Utc::now()) {
                            warn!(signal_id = %signal.signal_id, "strategy emitted an already-expired signal, dropping");
                            continue;
                        }
                        self.bus.publish(&format!("signal.{name}"), signal);
                    }
                }
                Err(_) => {
                    error!(strategy = %name, "strategy panicked during detection, continuing");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{InMemoryOrderBook, TokenId};
    use rust_decimal_macros::dec;

    struct AlwaysEmpty {
        enabled: bool,
        markets: Vec<MarketId>,
    }

    impl Strategy for AlwaysEmpty {
        fn name(&self) -> &str {
            "noop"
        }
        fn enabled(&self) -> bool {
            self.enabled
        }
        fn subscribed_markets(&self) -> Vec<MarketId> {
            self.markets.clone()
        }
        fn on_market_data(&self, _book: &MarketOrderBook) -> Vec<TradingSignal> {
            vec![]
        }
    }

    fn book(market_id: &str) -> MarketOrderBook {
        let mut yes = InMemoryOrderBook::new(TokenId::new("yes"));
        let mut no = InMemoryOrderBook::new(TokenId::new("no"));
        yes.update_ask(dec!(0.45), dec!(100));
        no.update_ask(dec!(0.50), dec!(100));
        MarketOrderBook::new(MarketId::new(market_id), yes, no)
    }

    #[test]
    fn degraded_when_no_strategies() {
        let engine = StrategyEngine::new(EventBus::new());
        assert!(engine.is_degraded());
    }

    #[test]
    fn degraded_when_none_enabled() {
        let engine = StrategyEngine::new(EventBus::new());
        engine.register(Arc::new(AlwaysEmpty {
            enabled: false,
            markets: vec![MarketId::new("m1")],
        }));
        assert!(engine.is_degraded());
    }

    #[tokio::test]
    async fn routes_only_to_subscribed_markets() {
        let bus = EventBus::new();
        let engine = StrategyEngine::new(bus.clone());
        engine.register(Arc::new(AlwaysEmpty {
            enabled: true,
            markets: vec![MarketId::new("m1")],
        }));
        assert!(!engine.is_degraded());
        // Does not panic for an unsubscribed market.
        engine.handle_market_data(&book("m2"));
    }
}
