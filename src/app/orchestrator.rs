//! Wires the event bus, market data service, strategy engine, risk
//! manager, execution engine, settlement manager, and state store into
//! one running process: every long-lived component runs as its own
//! background task, started once and supervised until shutdown.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use url::Url;

use crate::app::config::Settings;
use crate::core::bus::EventBus;
use crate::core::domain::{ClaimStatus, MarketId, Position, SettlementQueueEntry, TokenId, TradingSignal};
use crate::core::exchange::polymarket::{PolymarketClient, PolymarketConfig, PolymarketFeed};
use crate::core::exchange::{ExchangeClient, MarketDataFeed, MarketInfoSource, RedemptionClient};
use crate::core::execution::ExecutionEngine;
use crate::core::market_data::MarketDataService;
use crate::core::metrics;
use crate::core::risk::RiskManager;
use crate::core::settlement::SettlementManager;
use crate::core::store::memory::MemoryStore;
use crate::core::store::sqlite::SqliteStore;
use crate::core::store::StateStore;
use crate::core::strategy::{ArbitrageStrategy, StrategyEngine};
use crate::error::Result;

/// Owns every long-lived component. One instance per process; built
/// once from [`Settings`] and then driven by [`App::run_with_shutdown`].
pub struct App {
    bus: EventBus,
    store: Arc<dyn StateStore>,
    market_data: Arc<MarketDataService>,
    strategies: Arc<StrategyEngine>,
    risk: Arc<RiskManager>,
    execution: Arc<ExecutionEngine>,
    settlement: Arc<SettlementManager>,
}

impl App {
    pub async fn build(settings: &Settings) -> Result<Self> {
        let bus = EventBus::new();

        let store: Arc<dyn StateStore> = match &settings.database_url {
            Some(url) => Arc::new(SqliteStore::connect(url)?) as Arc<dyn StateStore>,
            None => Arc::new(MemoryStore::new()) as Arc<dyn StateStore>,
        };

        let api_url = Url::parse(&settings.exchange.api_url)?;
        let exchange_client = Arc::new(PolymarketClient::new(PolymarketConfig {
            api_url,
            timeout: StdDuration::from_secs(settings.exchange.request_timeout_seconds),
        }));
        let feed: Box<dyn MarketDataFeed> = Box::new(PolymarketFeed::new(settings.exchange.ws_url.clone()));

        let market_data = Arc::new(MarketDataService::new(settings.market_data.clone(), bus.clone(), feed));

        let strategies = Arc::new(StrategyEngine::new(bus.clone()));
        strategies.register(Arc::new(ArbitrageStrategy::new(settings.strategies.gabagool.clone())));

        let risk = Arc::new(RiskManager::new(settings.risk.clone(), bus.clone()));
        let execution = Arc::new(ExecutionEngine::new(
            settings.execution.clone(),
            bus.clone(),
            exchange_client.clone() as Arc<dyn ExchangeClient>,
        ));
        let settlement = Arc::new(SettlementManager::new(
            settings.settlement.clone(),
            bus.clone(),
            store.clone(),
            exchange_client.clone() as Arc<dyn MarketInfoSource>,
            exchange_client as Arc<dyn RedemptionClient>,
        ));

        for market in &settings.markets {
            market_data
                .subscribe_market(
                    MarketId::new(market.market_id.clone()),
                    TokenId::new(market.yes_token_id.clone()),
                    TokenId::new(market.no_token_id.clone()),
                )
                .await?;
        }

        Ok(Self {
            bus,
            store,
            market_data,
            strategies,
            risk,
            execution,
            settlement,
        })
    }

    pub async fn run(settings: &Settings) -> Result<()> {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let app = Arc::new(Self::build(settings).await?);
        app.run_with_shutdown(shutdown_rx).await
    }

    pub async fn run_with_shutdown(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!("starting orchestrator");
        metrics::install();

        {
            let market_data = self.market_data.clone();
            tokio::spawn(async move { market_data.run_event_loop().await });
        }
        {
            let market_data = self.market_data.clone();
            tokio::spawn(async move { market_data.run_stale_monitor().await });
        }
        self.spawn_market_data_router();
        self.spawn_signal_router();
        self.spawn_position_router();
        self.spawn_execution_workers();
        self.spawn_settlement_loop();
        self.spawn_daily_reset_loop();

        loop {
            match shutdown.changed().await {
                Ok(()) => {
                    if *shutdown.borrow() {
                        info!("shutdown signal received");
                        break;
                    }
                }
                Err(_) => {
                    info!("shutdown channel closed");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Routes `market.orderbook.*` updates to every strategy subscribed
    /// to that market.
    fn spawn_market_data_router(&self) {
        let mut sub = self.bus.subscribe("market.orderbook.*");
        let market_data = self.market_data.clone();
        let strategies = self.strategies.clone();
        tokio::spawn(async move {
            while let Some(update) = sub.recv_as::<crate::core::market_data::OrderBookUpdate>().await {
                let Some(book) = market_data.get_book(&update.market_id) else {
                    continue;
                };
                strategies.handle_market_data(&book);
            }
        });
    }

    /// Routes every strategy's signals through the risk manager and,
    /// on approval, into the execution queue.
    fn spawn_signal_router(&self) {
        let mut sub = self.bus.subscribe("signal.*");
        let risk = self.risk.clone();
        let execution = self.execution.clone();
        tokio::spawn(async move {
            while let Some(signal) = sub.recv_as::<TradingSignal>().await {
                let strategy_name = signal.strategy_name.clone();
                let now = Utc::now();
                match risk.evaluate((*signal).clone(), now) {
                    Ok(approved) => {
                        if let Err(e) = execution.enqueue(approved, now) {
                            warn!(strategy = %strategy_name, error = ?e, "failed to enqueue approved signal");
                        }
                    }
                    Err(rejection) => risk.publish_rejection(&strategy_name, rejection),
                }
            }
        });
    }

    /// Persists every opened position and queues it for settlement,
    /// one entry per leg.
    fn spawn_position_router(&self) {
        let mut sub = self.bus.subscribe("position.opened");
        let store = self.store.clone();
        tokio::spawn(async move {
            while let Some(position) = sub.recv_as::<Position>().await {
                if let Err(e) = store.save_position(&position).await {
                    error!(position_id = %position.position_id, error = %e, "failed to persist opened position");
                    continue;
                }
                for entry in settlement_entries(&position) {
                    if let Err(e) = store.queue_for_settlement(&entry).await {
                        error!(position_id = %position.position_id, error = %e, "failed to queue position for settlement");
                    }
                }
            }
        });
    }

    /// Drains the execution queue, handing each ready signal to a
    /// worker bounded by the engine's own concurrency permit.
    fn spawn_execution_workers(&self) {
        let execution = self.execution.clone();
        let market_data = self.market_data.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(StdDuration::from_millis(25));
            loop {
                interval.tick().await;
                let Some(queued) = execution.dequeue_ready(Utc::now()) else {
                    continue;
                };
                let Some(book) = market_data.get_book(&queued.data.signal.market_id) else {
                    warn!(signal_id = %queued.signal_id, "no order book for signal's market, dropping");
                    continue;
                };
                let execution = execution.clone();
                tokio::spawn(async move {
                    execution.execute(queued, &book).await;
                });
            }
        });
    }

    fn spawn_settlement_loop(&self) {
        let settlement = self.settlement.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(settlement.check_interval());
            loop {
                interval.tick().await;
                settlement.check_settlements(Utc::now()).await;
            }
        });
    }

    /// Resets the circuit breaker and exposure trackers when the UTC
    /// date rolls over.
    fn spawn_daily_reset_loop(&self) {
        let risk = self.risk.clone();
        tokio::spawn(async move {
            let mut last_date = Utc::now().date_naive();
            let mut interval = tokio::time::interval(StdDuration::from_secs(60));
            loop {
                interval.tick().await;
                let today = Utc::now().date_naive();
                if today != last_date {
                    info!(date = %today, "resetting risk manager for new day");
                    risk.reset_daily(today);
                    last_date = today;
                }
            }
        });
    }
}

/// Builds the settlement queue entries for a newly opened position,
/// one per leg, sharing one `condition_id`: the on-chain redemption
/// call covers both outcomes at once, but the entry model here tracks
/// claim state per leg.
fn settlement_entries(position: &Position) -> Vec<SettlementQueueEntry> {
    vec![
        SettlementQueueEntry {
            position_id: position.position_id.clone(),
            market_id: position.market_id.clone(),
            condition_id: position.condition_id.clone(),
            token_id: position.yes_token_id.clone(),
            side: crate::core::domain::Outcome::Yes,
            size: position.yes_size,
            entry_price: position.yes_avg_price,
            entry_cost: position.yes_size * position.yes_avg_price,
            market_end_time: position.opened_at,
            status: ClaimStatus::Pending,
            claim_attempts: 0,
            last_claim_error: None,
            next_retry_at: None,
            claimed_at: None,
            claim_proceeds: None,
            claim_profit: None,
        },
        SettlementQueueEntry {
            position_id: position.position_id.clone(),
            market_id: position.market_id.clone(),
            condition_id: position.condition_id.clone(),
            token_id: position.no_token_id.clone(),
            side: crate::core::domain::Outcome::No,
            size: position.no_size,
            entry_price: position.no_avg_price,
            entry_cost: position.no_size * position.no_avg_price,
            market_end_time: position.opened_at,
            status: ClaimStatus::Pending,
            claim_attempts: 0,
            last_claim_error: None,
            next_retry_at: None,
            claimed_at: None,
            claim_proceeds: None,
            claim_profit: None,
        },
    ]
}
