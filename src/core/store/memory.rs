//! In-memory [`StateStore`] for unit and integration tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::core::domain::{
    BreakerLevel, CircuitBreakerState, ClaimStatus, DailyStats, LedgerEntry, PnlType, Position, PositionId,
    PositionStatus, SettlementQueueEntry, Trade, TradeStatus,
};

use super::{DailyStatsField, RecordPnlOutcome, StateStore, StoreError, StoreResult};

#[derive(Default)]
struct Inner {
    trades: HashMap<String, Trade>,
    positions: HashMap<PositionId, Position>,
    settlement_queue: HashMap<PositionId, SettlementQueueEntry>,
    breaker: Option<CircuitBreakerState>,
    daily_stats: HashMap<NaiveDate, DailyStats>,
    ledger: Vec<LedgerEntry>,
}

pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn save_trade(&self, trade: &Trade) -> StoreResult<()> {
        self.inner.write().trades.insert(trade.trade_id.clone(), trade.clone());
        Ok(())
    }

    async fn get_trade(&self, trade_id: &str) -> StoreResult<Option<Trade>> {
        Ok(self.inner.read().trades.get(trade_id).cloned())
    }

    async fn resolve_trade(&self, trade_id: &str, now: DateTime<Utc>) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let trade = inner
            .trades
            .get_mut(trade_id)
            .ok_or_else(|| StoreError::TradeNotFound(trade_id.to_string()))?;
        trade.resolve(now);
        Ok(())
    }

    async fn save_position(&self, position: &Position) -> StoreResult<()> {
        self.inner
            .write()
            .positions
            .insert(position.position_id.clone(), position.clone());
        Ok(())
    }

    async fn get_open_positions(&self) -> StoreResult<Vec<Position>> {
        Ok(self
            .inner
            .read()
            .positions
            .values()
            .filter(|p| super::position_is_open(p))
            .cloned()
            .collect())
    }

    async fn close_position(&self, position_id: &PositionId, pnl: Decimal, now: DateTime<Utc>) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let position = inner
            .positions
            .get_mut(position_id)
            .ok_or_else(|| StoreError::PositionNotFound(position_id.clone()))?;
        position.close(pnl, now);
        Ok(())
    }

    async fn queue_for_settlement(&self, entry: &SettlementQueueEntry) -> StoreResult<()> {
        self.inner
            .write()
            .settlement_queue
            .insert(entry.position_id.clone(), entry.clone());
        Ok(())
    }

    async fn get_claimable_positions(
        &self,
        now: DateTime<Utc>,
        max_attempts: u32,
        min_time_since_end_seconds: i64,
    ) -> StoreResult<Vec<SettlementQueueEntry>> {
        Ok(self
            .inner
            .read()
            .settlement_queue
            .values()
            .filter(|e| e.status == ClaimStatus::Pending)
            .filter(|e| (now - e.market_end_time).num_seconds() >= min_time_since_end_seconds)
            .filter(|e| e.claim_attempts < max_attempts)
            .filter(|e| e.next_retry_at.map_or(true, |t| t <= now))
            .cloned()
            .collect())
    }

    async fn get_settlement_queue_entry(&self, position_id: &PositionId) -> StoreResult<Option<SettlementQueueEntry>> {
        Ok(self.inner.read().settlement_queue.get(position_id).cloned())
    }

    async fn mark_claimed(
        &self,
        position_id: &PositionId,
        proceeds: Decimal,
        profit: Decimal,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let entry = inner
            .settlement_queue
            .get_mut(position_id)
            .ok_or_else(|| StoreError::SettlementEntryNotFound(position_id.clone()))?;
        entry.mark_claimed(proceeds, profit, now);
        if let Some(position) = inner.positions.get_mut(position_id) {
            position.status = PositionStatus::Settled;
            position.settlement_proceeds = Some(proceeds);
        }
        Ok(())
    }

    async fn mark_settlement_failed(&self, position_id: &PositionId, reason: &str) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let entry = inner
            .settlement_queue
            .get_mut(position_id)
            .ok_or_else(|| StoreError::SettlementEntryNotFound(position_id.clone()))?;
        entry.status = ClaimStatus::Failed;
        entry.last_claim_error = Some(reason.to_string());
        Ok(())
    }

    async fn record_claim_attempt(
        &self,
        position_id: &PositionId,
        error: &str,
        next_retry_at: DateTime<Utc>,
    ) -> StoreResult<u32> {
        let mut inner = self.inner.write();
        let entry = inner
            .settlement_queue
            .get_mut(position_id)
            .ok_or_else(|| StoreError::SettlementEntryNotFound(position_id.clone()))?;
        entry.claim_attempts += 1;
        entry.last_claim_error = Some(error.to_string());
        entry.next_retry_at = Some(next_retry_at);
        Ok(entry.claim_attempts)
    }

    async fn retry_failed_claim(&self, position_id: &PositionId) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let entry = inner
            .settlement_queue
            .get_mut(position_id)
            .ok_or_else(|| StoreError::SettlementEntryNotFound(position_id.clone()))?;
        entry.status = ClaimStatus::Pending;
        entry.next_retry_at = None;
        Ok(())
    }

    async fn record_realized_pnl(
        &self,
        trade_id: &str,
        amount: Decimal,
        pnl_type: PnlType,
        max_daily_loss: Decimal,
        now: DateTime<Utc>,
    ) -> StoreResult<RecordPnlOutcome> {
        let mut inner = self.inner.write();
        let today = now.date_naive();
        let breaker = inner.breaker.get_or_insert_with(|| CircuitBreakerState::new(today));
        if breaker.date != today {
            breaker.reset(today);
        }
        breaker.realized_pnl += amount;
        let realized_pnl = breaker.realized_pnl;
        let breached = realized_pnl <= -max_daily_loss;
        inner.ledger.push(LedgerEntry {
            trade_id: trade_id.to_string(),
            trade_date: today,
            pnl_amount: amount,
            pnl_type,
            notes: None,
            recorded_at: now,
        });
        Ok(RecordPnlOutcome {
            realized_pnl,
            breached_daily_loss: breached,
        })
    }

    async fn get_circuit_breaker_state(&self) -> StoreResult<CircuitBreakerState> {
        let mut inner = self.inner.write();
        let today = Utc::now().date_naive();
        Ok(inner.breaker.get_or_insert_with(|| CircuitBreakerState::new(today)).clone())
    }

    async fn reset_circuit_breaker(&self, today: NaiveDate) -> StoreResult<()> {
        let mut inner = self.inner.write();
        inner.breaker = Some(CircuitBreakerState::new(today));
        Ok(())
    }

    async fn set_breaker_level(&self, level: BreakerLevel, reason: String, now: DateTime<Utc>) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let today = now.date_naive();
        let breaker = inner.breaker.get_or_insert_with(|| CircuitBreakerState::new(today));
        breaker.level = level;
        breaker.hit_at = Some(now);
        breaker.hit_reason = Some(reason);
        Ok(())
    }

    async fn get_daily_stats(&self, date: NaiveDate) -> StoreResult<DailyStats> {
        Ok(self.inner.read().daily_stats.get(&date).cloned().unwrap_or(DailyStats {
            date: Some(date),
            ..DailyStats::default()
        }))
    }

    async fn update_daily_stats(&self, stats: &DailyStats) -> StoreResult<()> {
        let Some(date) = stats.date else {
            return Err(StoreError::Backend("daily stats require a date".to_string()));
        };
        self.inner.write().daily_stats.insert(date, stats.clone());
        Ok(())
    }

    async fn increment_daily_stats(&self, date: NaiveDate, field: DailyStatsField, amount: Decimal) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let stats = inner.daily_stats.entry(date).or_insert(DailyStats {
            date: Some(date),
            ..DailyStats::default()
        });
        let as_u32 = amount.to_u32().unwrap_or(0);
        match field {
            DailyStatsField::TradeCount => stats.trade_count += as_u32,
            DailyStatsField::VolumeUsd => stats.volume_usd += amount,
            DailyStatsField::PositionsOpened => stats.positions_opened += as_u32,
            DailyStatsField::PositionsClosed => stats.positions_closed += as_u32,
            DailyStatsField::Wins => stats.wins += as_u32,
            DailyStatsField::Losses => stats.losses += as_u32,
            DailyStatsField::OpportunitiesDetected => stats.opportunities_detected += as_u32,
            DailyStatsField::OpportunitiesExecuted => stats.opportunities_executed += as_u32,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{ConditionId, MarketId, SignalId, TokenId};
    use rust_decimal_macros::dec;

    fn position(id: &str) -> Position {
        Position {
            position_id: PositionId::new(id),
            market_id: MarketId::new("m1"),
            condition_id: ConditionId::new("c1"),
            yes_token_id: TokenId::new("yes"),
            no_token_id: TokenId::new("no"),
            yes_size: dec!(10),
            no_size: dec!(10),
            yes_avg_price: dec!(0.45),
            no_avg_price: dec!(0.5),
            status: PositionStatus::Open,
            opened_at: Utc::now(),
            closed_at: None,
            realized_pnl: None,
            settlement_proceeds: None,
        }
    }

    fn settlement_entry(position_id: &str, market_end_time: DateTime<Utc>) -> SettlementQueueEntry {
        SettlementQueueEntry {
            position_id: PositionId::new(position_id),
            market_id: MarketId::new("m1"),
            condition_id: ConditionId::new("c1"),
            token_id: TokenId::new("yes"),
            side: crate::core::domain::Outcome::Yes,
            size: dec!(10),
            entry_price: dec!(0.45),
            entry_cost: dec!(4.5),
            market_end_time,
            status: ClaimStatus::Pending,
            claim_attempts: 0,
            last_claim_error: None,
            next_retry_at: None,
            claimed_at: None,
            claim_proceeds: None,
            claim_profit: None,
        }
    }

    #[tokio::test]
    async fn open_positions_excludes_closed() {
        let store = MemoryStore::new();
        let mut closed = position("p1");
        closed.status = PositionStatus::Closed;
        store.save_position(&closed).await.unwrap();
        store.save_position(&position("p2")).await.unwrap();
        let open = store.get_open_positions().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].position_id, PositionId::new("p2"));
    }

    #[tokio::test]
    async fn claimable_positions_respects_all_four_filters() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .queue_for_settlement(&settlement_entry("p1", now - chrono::Duration::hours(2)))
            .await
            .unwrap();
        store
            .queue_for_settlement(&settlement_entry("p2", now)) // too recent
            .await
            .unwrap();
        let claimable = store.get_claimable_positions(now, 5, 3600).await.unwrap();
        assert_eq!(claimable.len(), 1);
        assert_eq!(claimable[0].position_id, PositionId::new("p1"));
    }

    #[tokio::test]
    async fn record_claim_attempt_increments_and_returns_new_count() {
        let store = MemoryStore::new();
        store.queue_for_settlement(&settlement_entry("p1", Utc::now())).await.unwrap();
        let attempts = store
            .record_claim_attempt(&PositionId::new("p1"), "rpc timeout", Utc::now())
            .await
            .unwrap();
        assert_eq!(attempts, 1);
        let attempts2 = store
            .record_claim_attempt(&PositionId::new("p1"), "rpc timeout", Utc::now())
            .await
            .unwrap();
        assert_eq!(attempts2, 2);
    }

    #[tokio::test]
    async fn record_realized_pnl_flags_daily_loss_breach() {
        let store = MemoryStore::new();
        let outcome = store
            .record_realized_pnl("t1", dec!(-600), PnlType::Resolution, dec!(500), Utc::now())
            .await
            .unwrap();
        assert!(outcome.breached_daily_loss);
        assert_eq!(outcome.realized_pnl, dec!(-600));
    }

    #[tokio::test]
    async fn increment_daily_stats_accumulates() {
        let store = MemoryStore::new();
        let date = Utc::now().date_naive();
        store
            .increment_daily_stats(date, DailyStatsField::TradeCount, dec!(1))
            .await
            .unwrap();
        store
            .increment_daily_stats(date, DailyStatsField::TradeCount, dec!(1))
            .await
            .unwrap();
        let stats = store.get_daily_stats(date).await.unwrap();
        assert_eq!(stats.trade_count, 2);
    }
}
