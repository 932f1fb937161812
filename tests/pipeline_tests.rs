//! End-to-end flow through market data, strategy detection, risk
//! approval, and dual-leg execution, wired the way
//! `edgelord_core::app::orchestrator::App` wires its routers, but
//! driven directly against scripted fakes instead of a live exchange.

use std::sync::Arc;
use std::time::Duration;

use edgelord_core::core::bus::EventBus;
use edgelord_core::core::domain::{MarketId, OrderBookLevel, Position, TokenId, TradingSignal};
use edgelord_core::core::exchange::{ExchangeClient, MarketEvent};
use edgelord_core::core::execution::{ExecutionConfig, ExecutionEngine};
use edgelord_core::core::market_data::{MarketDataConfig, MarketDataService};
use edgelord_core::core::risk::{RiskConfig, RiskManager};
use edgelord_core::core::strategy::{ArbitrageConfig, ArbitrageStrategy, StrategyEngine};
use edgelord_core::core::testkit::{boxed_feed, FakeExchangeClient};
use rust_decimal_macros::dec;

/// A book snapshot on both legs with a 5c combined-ask spread, enough
/// to clear the strategy's default 1.5c threshold.
fn arbitrage_events() -> Vec<MarketEvent> {
    vec![
        MarketEvent::BookSnapshot {
            token_id: TokenId::new("yes"),
            bids: vec![],
            asks: vec![OrderBookLevel::new(dec!(0.45), dec!(100))],
        },
        MarketEvent::BookSnapshot {
            token_id: TokenId::new("no"),
            bids: vec![],
            asks: vec![OrderBookLevel::new(dec!(0.50), dec!(100))],
        },
    ]
}

#[tokio::test]
async fn arbitrage_opportunity_flows_to_a_filled_dual_leg_position() {
    let bus = EventBus::new();

    let market_data = Arc::new(MarketDataService::new(
        MarketDataConfig::default(),
        bus.clone(),
        boxed_feed(arbitrage_events()),
    ));
    market_data
        .subscribe_market(MarketId::new("m1"), TokenId::new("yes"), TokenId::new("no"))
        .await
        .unwrap();

    let strategies = Arc::new(StrategyEngine::new(bus.clone()));
    strategies.register(Arc::new(ArbitrageStrategy::new(ArbitrageConfig {
        markets: vec!["m1".to_string()],
        max_trade_size_usd: dec!(10),
        ..Default::default()
    })));

    let risk = Arc::new(RiskManager::new(
        RiskConfig {
            min_time_remaining_seconds: 0,
            ..Default::default()
        },
        bus.clone(),
    ));

    let exchange = Arc::new(FakeExchangeClient::new());
    let execution = Arc::new(ExecutionEngine::new(
        ExecutionConfig::default(),
        bus.clone(),
        exchange.clone() as Arc<dyn ExchangeClient>,
    ));

    let mut position_sub = bus.subscribe("position.opened");

    {
        let market_data = market_data.clone();
        tokio::spawn(async move { market_data.run_event_loop().await });
    }
    {
        let mut sub = bus.subscribe("market.orderbook.*");
        let market_data = market_data.clone();
        let strategies = strategies.clone();
        tokio::spawn(async move {
            while let Some(update) = sub
                .recv_as::<edgelord_core::core::market_data::OrderBookUpdate>()
                .await
            {
                if let Some(book) = market_data.get_book(&update.market_id) {
                    strategies.handle_market_data(&book);
                }
            }
        });
    }
    {
        let mut sub = bus.subscribe("signal.*");
        let risk = risk.clone();
        let execution = execution.clone();
        tokio::spawn(async move {
            while let Some(signal) = sub.recv_as::<TradingSignal>().await {
                match risk.evaluate((*signal).clone(), chrono::Utc::now()) {
                    Ok(approved) => execution.enqueue(approved, chrono::Utc::now()).unwrap(),
                    Err(rejection) => panic!("signal unexpectedly rejected: {}", rejection.reason),
                }
            }
        });
    }

    let position = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(queued) = execution.dequeue_ready(chrono::Utc::now()) {
                let book = market_data.get_book(&MarketId::new("m1")).unwrap();
                execution.execute(queued, &book).await;
            }
            if let Ok(Some(position)) = tokio::time::timeout(Duration::from_millis(10), position_sub.recv_as::<Position>()).await {
                return position;
            }
        }
    })
    .await
    .expect("position should open within the timeout");

    assert_eq!(position.market_id, MarketId::new("m1"));
    assert!(position.yes_size > dec!(0));
    assert!(position.no_size > dec!(0));
    assert_eq!(exchange.submitted_count(), 2);
    assert_eq!(execution.total_completed(), 1);
}
