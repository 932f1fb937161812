//! Trading signals emitted by strategies and approved by the risk manager.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::id::{MarketId, SignalId, TokenId};
use super::money::{Price, Usd};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalType {
    Arbitrage,
    BuyYes,
    BuyNo,
    Sell,
}

/// Execution priority. Ordered so that `CRITICAL < HIGH < MEDIUM < LOW`
/// when compared with `Ord`, matching the queue's min-heap ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    /// Derive priority from spread in cents.
    #[must_use]
    pub fn from_spread_cents(spread_cents: Decimal) -> Self {
        if spread_cents >= Decimal::from(4) {
            Self::Critical
        } else if spread_cents >= Decimal::from(3) {
            Self::High
        } else if spread_cents >= Decimal::from(2) {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// A signal produced by a strategy, not yet risk-checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingSignal {
    pub signal_id: SignalId,
    pub strategy_name: String,
    pub market_id: MarketId,
    pub signal_type: SignalType,
    pub priority: Priority,
    pub confidence: Decimal,
    pub target_size_usd: Usd,
    pub yes_price: Price,
    pub no_price: Price,
    pub yes_token_id: TokenId,
    pub no_token_id: TokenId,
    pub expected_pnl: Decimal,
    pub max_slippage: Decimal,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub metadata: Option<HashMap<String, String>>,
}

impl TradingSignal {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A signal the risk manager has cleared for execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovedSignal {
    pub signal: TradingSignal,
    pub approved_size_usd: Usd,
    pub approved_at: DateTime<Utc>,
}

impl ApprovedSignal {
    #[must_use]
    pub fn new(signal: TradingSignal, approved_size_usd: Usd, approved_at: DateTime<Utc>) -> Self {
        debug_assert!(approved_size_usd <= signal.target_size_usd);
        Self {
            signal,
            approved_size_usd,
            approved_at,
        }
    }
}
