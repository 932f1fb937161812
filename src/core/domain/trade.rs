//! A completed (or in-flight) dual-leg execution, as persisted by the
//! state store. Distinct from [`super::order::Order`]: a trade is the
//! unit the store tracks end-to-end (`save_trade`/`get_trade`), while
//! an order is one leg's exchange-facing lifecycle.

use chrono::{DateTime, Utc};

use super::id::{MarketId, OrderId, PositionId, SignalId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeStatus {
    Open,
    Resolved,
}

#[derive(Debug, Clone)]
pub struct Trade {
    pub trade_id: String,
    pub market_id: MarketId,
    pub strategy_name: String,
    pub signal_id: SignalId,
    pub yes_order_id: Option<OrderId>,
    pub no_order_id: Option<OrderId>,
    pub position_id: Option<PositionId>,
    pub status: TradeStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Trade {
    pub fn resolve(&mut self, now: DateTime<Utc>) {
        self.status = TradeStatus::Resolved;
        self.resolved_at = Some(now);
    }
}
