//! Risk manager: exposure caps, daily loss limits, circuit breaker.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use tracing::{info, warn};

use crate::core::bus::EventBus;
use crate::core::domain::{ApprovedSignal, BreakerLevel, CircuitBreakerState, MarketId, TradingSignal};

fn default_max_exposure() -> Decimal {
    dec!(5000)
}
fn default_max_daily_loss() -> Decimal {
    dec!(500)
}
fn default_min_time_remaining_seconds() -> i64 {
    60
}
fn default_warning_at() -> u32 {
    3
}
fn default_caution_at() -> u32 {
    5
}
fn default_halt_at() -> u32 {
    8
}

#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "default_max_exposure")]
    pub max_exposure_usd: Decimal,
    #[serde(default = "default_max_exposure")]
    pub max_exposure_per_market_usd: Decimal,
    #[serde(default = "default_max_daily_loss")]
    pub max_daily_loss: Decimal,
    #[serde(default = "default_min_time_remaining_seconds")]
    pub min_time_remaining_seconds: i64,
    #[serde(default = "default_warning_at")]
    pub warning_at_failures: u32,
    #[serde(default = "default_caution_at")]
    pub caution_at_failures: u32,
    #[serde(default = "default_halt_at")]
    pub halt_at_failures: u32,
    /// When a signal would breach the exposure cap, shrink it to fit
    /// instead of rejecting outright.
    #[serde(default)]
    pub reduce_to_fit: bool,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_exposure_usd: default_max_exposure(),
            max_exposure_per_market_usd: default_max_exposure(),
            max_daily_loss: default_max_daily_loss(),
            min_time_remaining_seconds: default_min_time_remaining_seconds(),
            warning_at_failures: default_warning_at(),
            caution_at_failures: default_caution_at(),
            halt_at_failures: default_halt_at(),
            reduce_to_fit: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rejection {
    pub signal_id: String,
    pub reason: String,
}

pub struct RiskManager {
    config: RiskConfig,
    bus: EventBus,
    breaker: RwLock<CircuitBreakerState>,
    global_exposure: RwLock<Decimal>,
    per_market_exposure: RwLock<HashMap<MarketId, Decimal>>,
}

impl RiskManager {
    #[must_use]
    pub fn new(config: RiskConfig, bus: EventBus) -> Self {
        Self {
            config,
            bus,
            breaker: RwLock::new(CircuitBreakerState::new(Utc::now().date_naive())),
            global_exposure: RwLock::new(Decimal::ZERO),
            per_market_exposure: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn breaker_level(&self) -> BreakerLevel {
        self.breaker.read().level
    }

    pub fn record_failure(&self, now: DateTime<Utc>) {
        let mut breaker = self.breaker.write();
        breaker.record_failure(
            now,
            self.config.warning_at_failures,
            self.config.caution_at_failures,
            self.config.halt_at_failures,
        );
    }

    pub fn record_success(&self) {
        self.breaker.write().record_success();
    }

    pub fn reset_daily(&self, today: chrono::NaiveDate) {
        self.breaker.write().reset(today);
        *self.global_exposure.write() = Decimal::ZERO;
        self.per_market_exposure.write().clear();
    }

    pub fn set_exposure(&self, market_id: &MarketId, amount: Decimal) {
        let mut per_market = self.per_market_exposure.write();
        let previous = per_market.insert(market_id.clone(), amount).unwrap_or(Decimal::ZERO);
        let mut global = self.global_exposure.write();
        *global = *global - previous + amount;
    }

    /// Validate a signal against the breaker, exposure caps, enablement,
    /// and expiry; returns `Ok(ApprovedSignal)` or `Err(Rejection)`.
    ///
    /// Exposure precedence: per-market exposure is checked first, then
    /// global exposure, each producing a distinct rejection reason.
    pub fn evaluate(&self, signal: TradingSignal, now: DateTime<Utc>) -> Result<ApprovedSignal, Rejection> {
        let reject = |reason: String| Rejection {
            signal_id: signal.signal_id.to_string(),
            reason,
        };

        {
            let breaker = self.breaker.read();
            if breaker.is_halted() {
                return Err(reject("circuit breaker is halted".to_string()));
            }
            if breaker.realized_pnl <= -self.config.max_daily_loss {
                return Err(reject("daily realized loss limit breached".to_string()));
            }
        }

        if signal.is_expired(now) {
            return Err(reject("signal has expired".to_string()));
        }

        let time_remaining = (signal.expires_at - now).num_seconds();
        if time_remaining < self.config.min_time_remaining_seconds {
            return Err(reject("insufficient time remaining to resolution".to_string()));
        }

        let per_market_current = self
            .per_market_exposure
            .read()
            .get(&signal.market_id)
            .copied()
            .unwrap_or(Decimal::ZERO);
        let global_current = *self.global_exposure.read();

        let mut approved_size = signal.target_size_usd;

        let per_market_headroom = self.config.max_exposure_per_market_usd - per_market_current;
        if per_market_current + approved_size > self.config.max_exposure_per_market_usd {
            if self.config.reduce_to_fit && per_market_headroom > Decimal::ZERO {
                approved_size = approved_size.min(per_market_headroom);
            } else {
                return Err(reject(format!(
                    "per-market exposure cap breached: {per_market_current} + {} > {}",
                    signal.target_size_usd, self.config.max_exposure_per_market_usd
                )));
            }
        }

        let global_headroom = self.config.max_exposure_usd - global_current;
        if global_current + approved_size > self.config.max_exposure_usd {
            if self.config.reduce_to_fit && global_headroom > Decimal::ZERO {
                approved_size = approved_size.min(global_headroom);
            } else {
                return Err(reject(format!(
                    "global exposure cap breached: {global_current} + {approved_size} > {}",
                    self.config.max_exposure_usd
                )));
            }
        }

        if approved_size <= Decimal::ZERO {
            return Err(reject("no exposure headroom remaining".to_string()));
        }

        let strategy_name = signal.strategy_name.clone();
        let approved = ApprovedSignal::new(signal, approved_size, now);
        self.bus.publish(&format!("risk.approved.{strategy_name}"), approved.clone());
        info!(signal_id = %approved.signal.signal_id, approved_size_usd = %approved.approved_size_usd, "signal approved");
        Ok(approved)
    }

    pub fn publish_rejection(&self, strategy_name: &str, rejection: Rejection) {
        warn!(signal_id = %rejection.signal_id, reason = %rejection.reason, "signal rejected");
        self.bus
            .publish(&format!("risk.rejected.{strategy_name}"), Arc::new(rejection));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{Priority, SignalId, SignalType, TokenId};
    use chrono::Duration;

    fn signal(market: &str, target: Decimal) -> TradingSignal {
        let now = Utc::now();
        TradingSignal {
            signal_id: SignalId::generate(),
            strategy_name: "gabagool".to_string(),
            market_id: MarketId::new(market),
            signal_type: SignalType::Arbitrage,
            priority: Priority::High,
            confidence: dec!(0.9),
            target_size_usd: target,
            yes_price: dec!(0.45),
            no_price: dec!(0.50),
            yes_token_id: TokenId::new("yes"),
            no_token_id: TokenId::new("no"),
            expected_pnl: dec!(1),
            max_slippage: dec!(0.01),
            created_at: now,
            expires_at: now + Duration::seconds(120),
            metadata: None,
        }
    }

    #[test]
    fn approves_within_caps() {
        let risk = RiskManager::new(RiskConfig::default(), EventBus::new());
        let approved = risk.evaluate(signal("m1", dec!(10)), Utc::now()).unwrap();
        assert_eq!(approved.approved_size_usd, dec!(10));
    }

    #[test]
    fn halted_breaker_rejects() {
        let risk = RiskManager::new(RiskConfig::default(), EventBus::new());
        for _ in 0..8 {
            risk.record_failure(Utc::now());
        }
        assert_eq!(risk.breaker_level(), BreakerLevel::Halt);
        assert!(risk.evaluate(signal("m1", dec!(10)), Utc::now()).is_err());
    }

    #[test]
    fn per_market_cap_checked_before_global() {
        let config = RiskConfig {
            max_exposure_usd: dec!(1000),
            max_exposure_per_market_usd: dec!(50),
            reduce_to_fit: false,
            ..Default::default()
        };
        let risk = RiskManager::new(config, EventBus::new());
        risk.set_exposure(&MarketId::new("m1"), dec!(45));
        let result = risk.evaluate(signal("m1", dec!(10)), Utc::now());
        assert!(result.is_err());
        assert!(result.unwrap_err().reason.contains("per-market"));
    }

    #[test]
    fn reduces_to_fit_when_enabled() {
        let config = RiskConfig {
            max_exposure_usd: dec!(1000),
            max_exposure_per_market_usd: dec!(50),
            reduce_to_fit: true,
            ..Default::default()
        };
        let risk = RiskManager::new(config, EventBus::new());
        risk.set_exposure(&MarketId::new("m1"), dec!(45));
        let approved = risk.evaluate(signal("m1", dec!(10)), Utc::now()).unwrap();
        assert_eq!(approved.approved_size_usd, dec!(5));
    }

    #[test]
    fn expired_signal_is_rejected() {
        let risk = RiskManager::new(RiskConfig::default(), EventBus::new());
        let mut s = signal("m1", dec!(10));
        s.expires_at = s.created_at - Duration::seconds(1);
        assert!(risk.evaluate(s, Utc::now()).is_err());
    }
}
