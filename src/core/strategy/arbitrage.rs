//! "Gabagool", the single-market arbitrage detection strategy.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use crate::core::domain::{
    is_valid_price, MarketId, MarketOrderBook, Priority, SignalId, SignalType, TradingSignal,
};

use super::Strategy;

fn default_min_spread_threshold() -> Decimal {
    dec!(0.015)
}
fn default_min_hedge_ratio() -> Decimal {
    dec!(0.80)
}
fn default_critical_hedge_ratio() -> Decimal {
    dec!(0.60)
}
fn default_signal_cooldown_seconds() -> i64 {
    30
}
fn default_signal_ttl_seconds() -> i64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArbitrageConfig {
    #[serde(default = "crate::app::config::default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub markets: Vec<String>,
    #[serde(default = "default_min_spread_threshold")]
    pub min_spread_threshold: Decimal,
    pub max_trade_size_usd: Decimal,
    #[serde(default)]
    pub min_time_remaining_seconds: i64,
    #[serde(default = "default_min_hedge_ratio")]
    pub min_hedge_ratio: Decimal,
    #[serde(default = "default_critical_hedge_ratio")]
    pub critical_hedge_ratio: Decimal,
    #[serde(default = "default_signal_cooldown_seconds")]
    pub signal_cooldown_seconds: i64,
    #[serde(default)]
    pub balance_sizing_enabled: bool,
    #[serde(default)]
    pub balance_sizing_pct: Decimal,
}

impl Default for ArbitrageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            markets: Vec::new(),
            min_spread_threshold: default_min_spread_threshold(),
            max_trade_size_usd: dec!(100),
            min_time_remaining_seconds: 0,
            min_hedge_ratio: default_min_hedge_ratio(),
            critical_hedge_ratio: default_critical_hedge_ratio(),
            signal_cooldown_seconds: default_signal_cooldown_seconds(),
            balance_sizing_enabled: false,
            balance_sizing_pct: dec!(0),
        }
    }
}

/// Share-equalized sizing: given budget `B` and ask prices `(p_y, p_n)`
/// with `p_y + p_n < 1`, split the budget so `a_y/p_y == a_n/p_n`.
/// Returns `(0, 0)` for zero/impossible prices.
#[must_use]
pub fn size_legs(budget: Decimal, yes_price: Decimal, no_price: Decimal) -> (Decimal, Decimal) {
    let combined = yes_price + no_price;
    if yes_price <= Decimal::ZERO || no_price <= Decimal::ZERO || combined <= Decimal::ZERO {
        return (Decimal::ZERO, Decimal::ZERO);
    }
    let a_yes = budget * yes_price / combined;
    let a_no = budget * no_price / combined;
    (a_yes, a_no)
}

/// Per-market cooldown clock. Strategies own their own cooldown state
/// and never mutate signals once emitted.
struct Cooldowns {
    expiry: HashMap<MarketId, DateTime<Utc>>,
}

impl Cooldowns {
    fn is_active(&self, market_id: &MarketId, now: DateTime<Utc>) -> bool {
        self.expiry.get(market_id).is_some_and(|exp| now < *exp)
    }

    fn start(&mut self, market_id: MarketId, emitted_at: DateTime<Utc>, cooldown_seconds: i64) {
        self.expiry
            .insert(market_id, emitted_at + Duration::seconds(cooldown_seconds));
    }
}

pub struct ArbitrageStrategy {
    config: ArbitrageConfig,
    enabled: AtomicBool,
    cooldowns: Mutex<Cooldowns>,
    markets: Vec<MarketId>,
}

impl ArbitrageStrategy {
    #[must_use]
    pub fn new(config: ArbitrageConfig) -> Self {
        let markets = config.markets.iter().map(MarketId::new).collect();
        let enabled = config.enabled;
        Self {
            config,
            enabled: AtomicBool::new(enabled),
            cooldowns: Mutex::new(Cooldowns {
                expiry: HashMap::new(),
            }),
            markets,
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    fn validate(&self, yes_price: Decimal, no_price: Decimal, spread: Decimal) -> bool {
        is_valid_price(yes_price)
            && is_valid_price(no_price)
            && spread >= self.config.min_spread_threshold
    }

    fn confidence_for(&self, spread_cents: Decimal) -> Decimal {
        // Monotone in spread_cents, capped at 0.95.
        let scaled = dec!(0.5) + spread_cents * dec!(0.08);
        scaled.min(dec!(0.95)).max(dec!(0))
    }
}

impl Strategy for ArbitrageStrategy {
    fn name(&self) -> &str {
        "gabagool"
    }

    fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn subscribed_markets(&self) -> Vec<MarketId> {
        self.markets.clone()
    }

    fn on_market_data(&self, book: &MarketOrderBook) -> Vec<TradingSignal> {
        let Some(yes_ask) = book.yes_book.best_ask() else {
            return vec![];
        };
        let Some(no_ask) = book.no_book.best_ask() else {
            return vec![];
        };
        let combined_ask = yes_ask.price + no_ask.price;
        if combined_ask >= Decimal::ONE {
            return vec![];
        }
        let spread = Decimal::ONE - combined_ask;

        let now = Utc::now();
        {
            let cooldowns = self.cooldowns.lock();
            if cooldowns.is_active(&book.market_id, now) {
                return vec![];
            }
        }

        if !self.validate(yes_ask.price, no_ask.price, spread) {
            return vec![];
        }

        let (a_yes, a_no) = size_legs(self.config.max_trade_size_usd, yes_ask.price, no_ask.price);
        if a_yes <= Decimal::ZERO || a_no <= Decimal::ZERO {
            return vec![];
        }

        let shares_yes = a_yes / yes_ask.price;
        let shares_no = a_no / no_ask.price;
        let matched = shares_yes.min(shares_no);
        let total_cost = a_yes + a_no;
        let expected_pnl = matched - total_cost;

        let spread_cents = spread * dec!(100);
        let priority = Priority::from_spread_cents(spread_cents);
        let confidence = self.confidence_for(spread_cents);

        let signal = TradingSignal {
            signal_id: SignalId::generate(),
            strategy_name: self.name().to_string(),
            market_id: book.market_id.clone(),
            signal_type: SignalType::Arbitrage,
            priority,
            confidence,
            target_size_usd: total_cost,
            yes_price: yes_ask.price,
            no_price: no_ask.price,
            yes_token_id: book.yes_book.token_id().clone(),
            no_token_id: book.no_book.token_id().clone(),
            expected_pnl,
            max_slippage: dec!(0.01),
            created_at: now,
            expires_at: now + Duration::seconds(30),
            metadata: None,
        };

        self.cooldowns
            .lock()
            .start(book.market_id.clone(), now, self.config.signal_cooldown_seconds);

        vec![signal]
    }
}
