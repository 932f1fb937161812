//! Circuit breaker and daily trading statistics.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Four-level circuit breaker guarding new signal approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BreakerLevel {
    Normal,
    Warning,
    Caution,
    Halt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub date: NaiveDate,
    pub realized_pnl: Decimal,
    pub level: BreakerLevel,
    pub hit_at: Option<DateTime<Utc>>,
    pub hit_reason: Option<String>,
    pub total_trades_today: u32,
    pub consecutive_failures: u32,
}

impl CircuitBreakerState {
    #[must_use]
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            realized_pnl: Decimal::ZERO,
            level: BreakerLevel::Normal,
            hit_at: None,
            hit_reason: None,
            total_trades_today: 0,
            consecutive_failures: 0,
        }
    }

    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.level == BreakerLevel::Halt
    }

    /// Escalate the breaker on a recorded failure. Thresholds are in
    /// number of consecutive failures: 3 -> Warning, 5 -> Caution,
    /// 8 -> Halt.
    pub fn record_failure(&mut self, now: DateTime<Utc>, warning_at: u32, caution_at: u32, halt_at: u32) {
        self.consecutive_failures += 1;
        let new_level = if self.consecutive_failures >= halt_at {
            BreakerLevel::Halt
        } else if self.consecutive_failures >= caution_at {
            BreakerLevel::Caution
        } else if self.consecutive_failures >= warning_at {
            BreakerLevel::Warning
        } else {
            self.level
        };
        if new_level > self.level {
            self.level = new_level;
            self.hit_at = Some(now);
            self.hit_reason = Some(format!(
                "{} consecutive failures escalated breaker to {:?}",
                self.consecutive_failures, new_level
            ));
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn reset(&mut self, date: NaiveDate) {
        *self = Self::new(date);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: Option<NaiveDate>,
    pub trade_count: u32,
    pub volume_usd: Decimal,
    pub realized_pnl: Decimal,
    pub positions_opened: u32,
    pub positions_closed: u32,
    pub wins: u32,
    pub losses: u32,
    pub exposure: Decimal,
    pub opportunities_detected: u32,
    pub opportunities_executed: u32,
    pub max_drawdown: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
    }

    #[test]
    fn escalates_through_levels() {
        let mut breaker = CircuitBreakerState::new(date());
        let now = Utc::now();
        for _ in 0..3 {
            breaker.record_failure(now, 3, 5, 8);
        }
        assert_eq!(breaker.level, BreakerLevel::Warning);
        for _ in 0..2 {
            breaker.record_failure(now, 3, 5, 8);
        }
        assert_eq!(breaker.level, BreakerLevel::Caution);
        for _ in 0..3 {
            breaker.record_failure(now, 3, 5, 8);
        }
        assert_eq!(breaker.level, BreakerLevel::Halt);
        assert!(breaker.is_halted());
    }

    #[test]
    fn success_resets_failure_streak_not_level() {
        let mut breaker = CircuitBreakerState::new(date());
        let now = Utc::now();
        breaker.record_failure(now, 3, 5, 8);
        breaker.record_failure(now, 3, 5, 8);
        breaker.record_failure(now, 3, 5, 8);
        assert_eq!(breaker.level, BreakerLevel::Warning);
        breaker.record_success();
        assert_eq!(breaker.consecutive_failures, 0);
        assert_eq!(breaker.level, BreakerLevel::Warning);
    }

    #[test]
    fn reset_restores_normal() {
        let mut breaker = CircuitBreakerState::new(date());
        breaker.record_failure(Utc::now(), 1, 2, 3);
        breaker.reset(date());
        assert_eq!(breaker.level, BreakerLevel::Normal);
        assert_eq!(breaker.consecutive_failures, 0);
    }
}
