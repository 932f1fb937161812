//! Durable persistence contract. One trait, two implementations:
//! [`memory::MemoryStore`] for tests and [`sqlite::SqliteStore`] for
//! production.

pub mod memory;
pub mod schema;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::core::domain::{
    BreakerLevel, CircuitBreakerState, DailyStats, PnlType, Position, PositionId, PositionStatus,
    SettlementQueueEntry, Trade,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("trade {0} not found")]
    TradeNotFound(String),
    #[error("position {0} not found")]
    PositionNotFound(PositionId),
    #[error("settlement queue entry for {0} not found")]
    SettlementEntryNotFound(PositionId),
    #[error("backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// New circuit breaker state after a realized P&L update, as returned
/// by `record_realized_pnl`: the store is the single authority on
/// whether the running daily loss breaches the halt threshold, since
/// it serializes concurrent writers.
#[derive(Debug, Clone, Copy)]
pub struct RecordPnlOutcome {
    pub realized_pnl: Decimal,
    pub breached_daily_loss: bool,
}

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn save_trade(&self, trade: &Trade) -> StoreResult<()>;
    async fn get_trade(&self, trade_id: &str) -> StoreResult<Option<Trade>>;
    async fn resolve_trade(&self, trade_id: &str, now: DateTime<Utc>) -> StoreResult<()>;

    async fn save_position(&self, position: &Position) -> StoreResult<()>;
    async fn get_open_positions(&self) -> StoreResult<Vec<Position>>;
    async fn close_position(&self, position_id: &PositionId, pnl: Decimal, now: DateTime<Utc>) -> StoreResult<()>;

    async fn queue_for_settlement(&self, entry: &SettlementQueueEntry) -> StoreResult<()>;
    /// Filters: `status = pending`, `now - market_end_time >=
    /// min_time_since_end_seconds`, `claim_attempts < max_attempts`,
    /// `next_retry_at <= now`.
    async fn get_claimable_positions(
        &self,
        now: DateTime<Utc>,
        max_attempts: u32,
        min_time_since_end_seconds: i64,
    ) -> StoreResult<Vec<SettlementQueueEntry>>;
    async fn get_settlement_queue_entry(&self, position_id: &PositionId) -> StoreResult<Option<SettlementQueueEntry>>;
    async fn mark_claimed(
        &self,
        position_id: &PositionId,
        proceeds: Decimal,
        profit: Decimal,
        now: DateTime<Utc>,
    ) -> StoreResult<()>;
    async fn mark_settlement_failed(&self, position_id: &PositionId, reason: &str) -> StoreResult<()>;
    async fn record_claim_attempt(
        &self,
        position_id: &PositionId,
        error: &str,
        next_retry_at: DateTime<Utc>,
    ) -> StoreResult<u32>;
    async fn retry_failed_claim(&self, position_id: &PositionId) -> StoreResult<()>;

    async fn record_realized_pnl(
        &self,
        trade_id: &str,
        amount: Decimal,
        pnl_type: PnlType,
        max_daily_loss: Decimal,
        now: DateTime<Utc>,
    ) -> StoreResult<RecordPnlOutcome>;
    async fn get_circuit_breaker_state(&self) -> StoreResult<CircuitBreakerState>;
    async fn reset_circuit_breaker(&self, today: chrono::NaiveDate) -> StoreResult<()>;
    async fn set_breaker_level(&self, level: BreakerLevel, reason: String, now: DateTime<Utc>) -> StoreResult<()>;

    async fn get_daily_stats(&self, date: chrono::NaiveDate) -> StoreResult<DailyStats>;
    async fn update_daily_stats(&self, stats: &DailyStats) -> StoreResult<()>;
    async fn increment_daily_stats(&self, date: chrono::NaiveDate, field: DailyStatsField, amount: Decimal) -> StoreResult<()>;
}

/// Which counter `increment_daily_stats` bumps. A typed enum keeps the
/// store trait from growing a method per counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyStatsField {
    TradeCount,
    VolumeUsd,
    PositionsOpened,
    PositionsClosed,
    Wins,
    Losses,
    OpportunitiesDetected,
    OpportunitiesExecuted,
}

pub(crate) fn position_is_open(position: &Position) -> bool {
    matches!(position.status, PositionStatus::Open | PositionStatus::PendingSettlement)
}
