//! Diesel/SQLite-backed [`StateStore`]: an r2d2 connection pool, one
//! blocking call per operation, and text-encoded decimals/timestamps
//! because SQLite has no native decimal type.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use rust_decimal::Decimal;

use crate::core::domain::{
    BreakerLevel, CircuitBreakerState, ClaimStatus, DailyStats, MarketId, Outcome, PnlType, Position, PositionId,
    PositionStatus, SettlementQueueEntry, Trade, TradeStatus,
};

use super::{schema, DailyStatsField, RecordPnlOutcome, StateStore, StoreError, StoreResult};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

pub struct SqliteStore {
    pool: DbPool,
}

fn to_backend(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn parse_decimal(s: &str) -> StoreResult<Decimal> {
    Decimal::from_str(s).map_err(to_backend)
}

fn parse_timestamp(s: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc)).map_err(to_backend)
}

fn parse_optional_timestamp(s: Option<String>) -> StoreResult<Option<DateTime<Utc>>> {
    s.map(|s| parse_timestamp(&s)).transpose()
}

fn parse_optional_decimal(s: Option<String>) -> StoreResult<Option<Decimal>> {
    s.map(|s| parse_decimal(&s)).transpose()
}

impl SqliteStore {
    /// Open (creating if absent) a SQLite file and run any pending
    /// migrations. `database_url` may be `:memory:` for tests.
    pub fn connect(database_url: &str) -> StoreResult<Self> {
        let manager = ConnectionManager::<SqliteConnection>::new(database_url);
        let pool = Pool::builder().build(manager).map_err(to_backend)?;
        let mut conn = pool.get().map_err(to_backend)?;
        conn.run_pending_migrations(MIGRATIONS).map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self { pool })
    }

    fn conn(&self) -> StoreResult<diesel::r2d2::PooledConnection<ConnectionManager<SqliteConnection>>> {
        self.pool.get().map_err(to_backend)
    }
}

#[derive(Insertable, Queryable)]
#[diesel(table_name = schema::trades)]
struct TradeRow {
    trade_id: String,
    market_id: String,
    strategy_name: String,
    signal_id: String,
    yes_order_id: Option<String>,
    no_order_id: Option<String>,
    position_id: Option<String>,
    status: String,
    created_at: String,
    resolved_at: Option<String>,
}

impl TradeRow {
    fn from_domain(trade: &Trade) -> Self {
        Self {
            trade_id: trade.trade_id.clone(),
            market_id: trade.market_id.as_str().to_string(),
            strategy_name: trade.strategy_name.clone(),
            signal_id: trade.signal_id.as_str().to_string(),
            yes_order_id: trade.yes_order_id.as_ref().map(|i| i.as_str().to_string()),
            no_order_id: trade.no_order_id.as_ref().map(|i| i.as_str().to_string()),
            position_id: trade.position_id.as_ref().map(|i| i.as_str().to_string()),
            status: match trade.status {
                TradeStatus::Open => "open".to_string(),
                TradeStatus::Resolved => "resolved".to_string(),
            },
            created_at: trade.created_at.to_rfc3339(),
            resolved_at: trade.resolved_at.map(|t| t.to_rfc3339()),
        }
    }

    fn into_domain(self) -> StoreResult<Trade> {
        Ok(Trade {
            trade_id: self.trade_id,
            market_id: MarketId::new(self.market_id),
            strategy_name: self.strategy_name,
            signal_id: self.signal_id.into(),
            yes_order_id: self.yes_order_id.map(Into::into),
            no_order_id: self.no_order_id.map(Into::into),
            position_id: self.position_id.map(Into::into),
            status: match self.status.as_str() {
                "resolved" => TradeStatus::Resolved,
                _ => TradeStatus::Open,
            },
            created_at: parse_timestamp(&self.created_at)?,
            resolved_at: parse_optional_timestamp(self.resolved_at)?,
        })
    }
}

#[derive(Insertable, Queryable)]
#[diesel(table_name = schema::positions)]
struct PositionRow {
    position_id: String,
    market_id: String,
    condition_id: String,
    yes_token_id: String,
    no_token_id: String,
    yes_size: String,
    no_size: String,
    yes_avg_price: String,
    no_avg_price: String,
    status: String,
    opened_at: String,
    closed_at: Option<String>,
    realized_pnl: Option<String>,
    settlement_proceeds: Option<String>,
}

fn position_status_str(status: PositionStatus) -> &'static str {
    match status {
        PositionStatus::Open => "open",
        PositionStatus::Closed => "closed",
        PositionStatus::PendingSettlement => "pending_settlement",
        PositionStatus::Settled => "settled",
    }
}

fn parse_position_status(s: &str) -> PositionStatus {
    match s {
        "closed" => PositionStatus::Closed,
        "pending_settlement" => PositionStatus::PendingSettlement,
        "settled" => PositionStatus::Settled,
        _ => PositionStatus::Open,
    }
}

impl PositionRow {
    fn from_domain(p: &Position) -> Self {
        Self {
            position_id: p.position_id.as_str().to_string(),
            market_id: p.market_id.as_str().to_string(),
            condition_id: p.condition_id.as_str().to_string(),
            yes_token_id: p.yes_token_id.as_str().to_string(),
            no_token_id: p.no_token_id.as_str().to_string(),
            yes_size: p.yes_size.to_string(),
            no_size: p.no_size.to_string(),
            yes_avg_price: p.yes_avg_price.to_string(),
            no_avg_price: p.no_avg_price.to_string(),
            status: position_status_str(p.status).to_string(),
            opened_at: p.opened_at.to_rfc3339(),
            closed_at: p.closed_at.map(|t| t.to_rfc3339()),
            realized_pnl: p.realized_pnl.map(|d| d.to_string()),
            settlement_proceeds: p.settlement_proceeds.map(|d| d.to_string()),
        }
    }

    fn into_domain(self) -> StoreResult<Position> {
        Ok(Position {
            position_id: self.position_id.into(),
            market_id: MarketId::new(self.market_id),
            condition_id: self.condition_id.into(),
            yes_token_id: self.yes_token_id.into(),
            no_token_id: self.no_token_id.into(),
            yes_size: parse_decimal(&self.yes_size)?,
            no_size: parse_decimal(&self.no_size)?,
            yes_avg_price: parse_decimal(&self.yes_avg_price)?,
            no_avg_price: parse_decimal(&self.no_avg_price)?,
            status: parse_position_status(&self.status),
            opened_at: parse_timestamp(&self.opened_at)?,
            closed_at: parse_optional_timestamp(self.closed_at)?,
            realized_pnl: parse_optional_decimal(self.realized_pnl)?,
            settlement_proceeds: parse_optional_decimal(self.settlement_proceeds)?,
        })
    }
}

#[derive(Insertable, Queryable)]
#[diesel(table_name = schema::settlement_queue)]
struct SettlementRow {
    position_id: String,
    market_id: String,
    condition_id: String,
    token_id: String,
    side: String,
    size: String,
    entry_price: String,
    entry_cost: String,
    market_end_time: String,
    status: String,
    claim_attempts: i32,
    last_claim_error: Option<String>,
    next_retry_at: Option<String>,
    claimed_at: Option<String>,
    claim_proceeds: Option<String>,
    claim_profit: Option<String>,
}

fn claim_status_str(status: ClaimStatus) -> &'static str {
    match status {
        ClaimStatus::Pending => "pending",
        ClaimStatus::Claimed => "claimed",
        ClaimStatus::Failed => "failed",
    }
}

fn parse_claim_status(s: &str) -> ClaimStatus {
    match s {
        "claimed" => ClaimStatus::Claimed,
        "failed" => ClaimStatus::Failed,
        _ => ClaimStatus::Pending,
    }
}

impl SettlementRow {
    fn from_domain(e: &SettlementQueueEntry) -> Self {
        Self {
            position_id: e.position_id.as_str().to_string(),
            market_id: e.market_id.as_str().to_string(),
            condition_id: e.condition_id.as_str().to_string(),
            token_id: e.token_id.as_str().to_string(),
            side: match e.side {
                Outcome::Yes => "yes".to_string(),
                Outcome::No => "no".to_string(),
            },
            size: e.size.to_string(),
            entry_price: e.entry_price.to_string(),
            entry_cost: e.entry_cost.to_string(),
            market_end_time: e.market_end_time.to_rfc3339(),
            status: claim_status_str(e.status).to_string(),
            claim_attempts: e.claim_attempts as i32,
            last_claim_error: e.last_claim_error.clone(),
            next_retry_at: e.next_retry_at.map(|t| t.to_rfc3339()),
            claimed_at: e.claimed_at.map(|t| t.to_rfc3339()),
            claim_proceeds: e.claim_proceeds.map(|d| d.to_string()),
            claim_profit: e.claim_profit.map(|d| d.to_string()),
        }
    }

    fn into_domain(self) -> StoreResult<SettlementQueueEntry> {
        Ok(SettlementQueueEntry {
            position_id: self.position_id.into(),
            market_id: MarketId::new(self.market_id),
            condition_id: self.condition_id.into(),
            token_id: self.token_id.into(),
            side: if self.side == "yes" { Outcome::Yes } else { Outcome::No },
            size: parse_decimal(&self.size)?,
            entry_price: parse_decimal(&self.entry_price)?,
            entry_cost: parse_decimal(&self.entry_cost)?,
            market_end_time: parse_timestamp(&self.market_end_time)?,
            status: parse_claim_status(&self.status),
            claim_attempts: self.claim_attempts as u32,
            last_claim_error: self.last_claim_error,
            next_retry_at: parse_optional_timestamp(self.next_retry_at)?,
            claimed_at: parse_optional_timestamp(self.claimed_at)?,
            claim_proceeds: parse_optional_decimal(self.claim_proceeds)?,
            claim_profit: parse_optional_decimal(self.claim_profit)?,
        })
    }
}

fn breaker_level_str(level: BreakerLevel) -> &'static str {
    match level {
        BreakerLevel::Normal => "normal",
        BreakerLevel::Warning => "warning",
        BreakerLevel::Caution => "caution",
        BreakerLevel::Halt => "halt",
    }
}

fn parse_breaker_level(s: &str) -> BreakerLevel {
    match s {
        "warning" => BreakerLevel::Warning,
        "caution" => BreakerLevel::Caution,
        "halt" => BreakerLevel::Halt,
        _ => BreakerLevel::Normal,
    }
}

#[async_trait]
impl StateStore for SqliteStore {
    async fn save_trade(&self, trade: &Trade) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::replace_into(schema::trades::table)
            .values(TradeRow::from_domain(trade))
            .execute(&mut conn)
            .map_err(to_backend)?;
        Ok(())
    }

    async fn get_trade(&self, trade_id: &str) -> StoreResult<Option<Trade>> {
        let mut conn = self.conn()?;
        let row: Option<TradeRow> = schema::trades::table
            .find(trade_id.to_string())
            .first(&mut conn)
            .optional()
            .map_err(to_backend)?;
        row.map(TradeRow::into_domain).transpose()
    }

    async fn resolve_trade(&self, trade_id: &str, now: DateTime<Utc>) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::update(schema::trades::table.find(trade_id.to_string()))
            .set((
                schema::trades::status.eq("resolved"),
                schema::trades::resolved_at.eq(now.to_rfc3339()),
            ))
            .execute(&mut conn)
            .map_err(to_backend)?;
        Ok(())
    }

    async fn save_position(&self, position: &Position) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::replace_into(schema::positions::table)
            .values(PositionRow::from_domain(position))
            .execute(&mut conn)
            .map_err(to_backend)?;
        Ok(())
    }

    async fn get_open_positions(&self) -> StoreResult<Vec<Position>> {
        let mut conn = self.conn()?;
        let rows: Vec<PositionRow> = schema::positions::table
            .filter(schema::positions::status.eq_any(["open", "pending_settlement"]))
            .load(&mut conn)
            .map_err(to_backend)?;
        rows.into_iter().map(PositionRow::into_domain).collect()
    }

    async fn close_position(&self, position_id: &PositionId, pnl: Decimal, now: DateTime<Utc>) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::update(schema::positions::table.find(position_id.as_str().to_string()))
            .set((
                schema::positions::status.eq("closed"),
                schema::positions::closed_at.eq(now.to_rfc3339()),
                schema::positions::realized_pnl.eq(pnl.to_string()),
            ))
            .execute(&mut conn)
            .map_err(to_backend)?;
        Ok(())
    }

    async fn queue_for_settlement(&self, entry: &SettlementQueueEntry) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::replace_into(schema::settlement_queue::table)
            .values(SettlementRow::from_domain(entry))
            .execute(&mut conn)
            .map_err(to_backend)?;
        Ok(())
    }

    async fn get_claimable_positions(
        &self,
        now: DateTime<Utc>,
        max_attempts: u32,
        min_time_since_end_seconds: i64,
    ) -> StoreResult<Vec<SettlementQueueEntry>> {
        let mut conn = self.conn()?;
        let cutoff = now - chrono::Duration::seconds(min_time_since_end_seconds);
        let rows: Vec<SettlementRow> = schema::settlement_queue::table
            .filter(schema::settlement_queue::status.eq("pending"))
            .filter(schema::settlement_queue::market_end_time.le(cutoff.to_rfc3339()))
            .filter(schema::settlement_queue::claim_attempts.lt(max_attempts as i32))
            .load(&mut conn)
            .map_err(to_backend)?;
        rows.into_iter()
            .map(SettlementRow::into_domain)
            .collect::<StoreResult<Vec<_>>>()
            .map(|entries| {
                entries
                    .into_iter()
                    .filter(|e| e.next_retry_at.is_none() || e.next_retry_at.unwrap() <= now)
                    .collect()
            })
    }

    async fn get_settlement_queue_entry(&self, position_id: &PositionId) -> StoreResult<Option<SettlementQueueEntry>> {
        let mut conn = self.conn()?;
        let row: Option<SettlementRow> = schema::settlement_queue::table
            .find(position_id.as_str().to_string())
            .first(&mut conn)
            .optional()
            .map_err(to_backend)?;
        row.map(SettlementRow::into_domain).transpose()
    }

    async fn mark_claimed(
        &self,
        position_id: &PositionId,
        proceeds: Decimal,
        profit: Decimal,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::update(schema::settlement_queue::table.find(position_id.as_str().to_string()))
            .set((
                schema::settlement_queue::status.eq("claimed"),
                schema::settlement_queue::claimed_at.eq(now.to_rfc3339()),
                schema::settlement_queue::claim_proceeds.eq(proceeds.to_string()),
                schema::settlement_queue::claim_profit.eq(profit.to_string()),
            ))
            .execute(&mut conn)
            .map_err(to_backend)?;
        diesel::update(schema::positions::table.find(position_id.as_str().to_string()))
            .set((
                schema::positions::status.eq("settled"),
                schema::positions::settlement_proceeds.eq(proceeds.to_string()),
            ))
            .execute(&mut conn)
            .map_err(to_backend)?;
        Ok(())
    }

    async fn mark_settlement_failed(&self, position_id: &PositionId, reason: &str) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::update(schema::settlement_queue::table.find(position_id.as_str().to_string()))
            .set((
                schema::settlement_queue::status.eq("failed"),
                schema::settlement_queue::last_claim_error.eq(reason),
            ))
            .execute(&mut conn)
            .map_err(to_backend)?;
        Ok(())
    }

    async fn record_claim_attempt(
        &self,
        position_id: &PositionId,
        error: &str,
        next_retry_at: DateTime<Utc>,
    ) -> StoreResult<u32> {
        let mut conn = self.conn()?;
        conn.transaction(|conn| {
            let current: i32 = schema::settlement_queue::table
                .find(position_id.as_str().to_string())
                .select(schema::settlement_queue::claim_attempts)
                .first(conn)?;
            let new_attempts = current + 1;
            diesel::update(schema::settlement_queue::table.find(position_id.as_str().to_string()))
                .set((
                    schema::settlement_queue::claim_attempts.eq(new_attempts),
                    schema::settlement_queue::last_claim_error.eq(error),
                    schema::settlement_queue::next_retry_at.eq(next_retry_at.to_rfc3339()),
                ))
                .execute(conn)?;
            Ok::<u32, diesel::result::Error>(new_attempts as u32)
        })
        .map_err(to_backend)
    }

    async fn retry_failed_claim(&self, position_id: &PositionId) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::update(schema::settlement_queue::table.find(position_id.as_str().to_string()))
            .set((
                schema::settlement_queue::status.eq("pending"),
                schema::settlement_queue::next_retry_at.eq(None::<String>),
            ))
            .execute(&mut conn)
            .map_err(to_backend)?;
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
        let mut conn = self.conn()?;
        let today = now.date_naive();
        conn.transaction(|conn| {
            let existing: Option<(String, String)> = schema::circuit_breaker_state::table
                .find(1)
                .select((schema::circuit_breaker_state::date, schema::circuit_breaker_state::realized_pnl))
                .first(conn)
                .optional()?;

            let current_pnl = match existing {
                Some((date_str, pnl_str)) if date_str == today.to_string() => {
                    Decimal::from_str(&pnl_str).unwrap_or(Decimal::ZERO)
                }
                _ => Decimal::ZERO,
            };
            let new_pnl = current_pnl + amount;

            diesel::replace_into(schema::circuit_breaker_state::table)
                .values((
                    schema::circuit_breaker_state::id.eq(1),
                    schema::circuit_breaker_state::date.eq(today.to_string()),
                    schema::circuit_breaker_state::realized_pnl.eq(new_pnl.to_string()),
                    schema::circuit_breaker_state::level.eq("normal"),
                    schema::circuit_breaker_state::total_trades_today.eq(0),
                    schema::circuit_breaker_state::consecutive_failures.eq(0),
                ))
                .execute(conn)?;

            diesel::insert_into(schema::realized_pnl_ledger::table)
                .values((
                    schema::realized_pnl_ledger::trade_id.eq(trade_id),
                    schema::realized_pnl_ledger::trade_date.eq(today.to_string()),
                    schema::realized_pnl_ledger::pnl_amount.eq(amount.to_string()),
                    schema::realized_pnl_ledger::pnl_type.eq(format!("{pnl_type:?}").to_lowercase()),
                    schema::realized_pnl_ledger::recorded_at.eq(now.to_rfc3339()),
                ))
                .execute(conn)?;

            Ok::<RecordPnlOutcome, diesel::result::Error>(RecordPnlOutcome {
                realized_pnl: new_pnl,
                breached_daily_loss: new_pnl <= -max_daily_loss,
            })
        })
        .map_err(to_backend)
    }

    async fn get_circuit_breaker_state(&self) -> StoreResult<CircuitBreakerState> {
        let mut conn = self.conn()?;
        let row: Option<(String, String, String, Option<String>, Option<String>, i32, i32)> =
            schema::circuit_breaker_state::table
                .find(1)
                .select((
                    schema::circuit_breaker_state::date,
                    schema::circuit_breaker_state::realized_pnl,
                    schema::circuit_breaker_state::level,
                    schema::circuit_breaker_state::hit_at,
                    schema::circuit_breaker_state::hit_reason,
                    schema::circuit_breaker_state::total_trades_today,
                    schema::circuit_breaker_state::consecutive_failures,
                ))
                .first(&mut conn)
                .optional()
                .map_err(to_backend)?;
        let Some((date, pnl, level, hit_at, hit_reason, total_trades, failures)) = row else {
            return Ok(CircuitBreakerState::new(Utc::now().date_naive()));
        };
        Ok(CircuitBreakerState {
            date: NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(to_backend)?,
            realized_pnl: parse_decimal(&pnl)?,
            level: parse_breaker_level(&level),
            hit_at: parse_optional_timestamp(hit_at)?,
            hit_reason,
            total_trades_today: total_trades as u32,
            consecutive_failures: failures as u32,
        })
    }

    async fn reset_circuit_breaker(&self, today: NaiveDate) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::replace_into(schema::circuit_breaker_state::table)
            .values((
                schema::circuit_breaker_state::id.eq(1),
                schema::circuit_breaker_state::date.eq(today.to_string()),
                schema::circuit_breaker_state::realized_pnl.eq("0"),
                schema::circuit_breaker_state::level.eq("normal"),
                schema::circuit_breaker_state::total_trades_today.eq(0),
                schema::circuit_breaker_state::consecutive_failures.eq(0),
            ))
            .execute(&mut conn)
            .map_err(to_backend)?;
        Ok(())
    }

    async fn set_breaker_level(&self, level: BreakerLevel, reason: String, now: DateTime<Utc>) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::update(schema::circuit_breaker_state::table.find(1))
            .set((
                schema::circuit_breaker_state::level.eq(breaker_level_str(level)),
                schema::circuit_breaker_state::hit_at.eq(now.to_rfc3339()),
                schema::circuit_breaker_state::hit_reason.eq(reason),
            ))
            .execute(&mut conn)
            .map_err(to_backend)?;
        Ok(())
    }

    async fn get_daily_stats(&self, date: NaiveDate) -> StoreResult<DailyStats> {
        let mut conn = self.conn()?;
        let row: Option<(i32, String, String, i32, i32, i32, i32, String, i32, i32, String)> = schema::daily_stats::table
            .find(date.to_string())
            .select((
                schema::daily_stats::trade_count,
                schema::daily_stats::volume_usd,
                schema::daily_stats::realized_pnl,
                schema::daily_stats::positions_opened,
                schema::daily_stats::positions_closed,
                schema::daily_stats::wins,
                schema::daily_stats::losses,
                schema::daily_stats::exposure,
                schema::daily_stats::opportunities_detected,
                schema::daily_stats::opportunities_executed,
                schema::daily_stats::max_drawdown,
            ))
            .first(&mut conn)
            .optional()
            .map_err(to_backend)?;
        let Some((trade_count, volume, pnl, opened, closed, wins, losses, exposure, detected, executed, drawdown)) = row
        else {
            return Ok(DailyStats {
                date: Some(date),
                ..DailyStats::default()
            });
        };
        Ok(DailyStats {
            date: Some(date),
            trade_count: trade_count as u32,
            volume_usd: parse_decimal(&volume)?,
            realized_pnl: parse_decimal(&pnl)?,
            positions_opened: opened as u32,
            positions_closed: closed as u32,
            wins: wins as u32,
            losses: losses as u32,
            exposure: parse_decimal(&exposure)?,
            opportunities_detected: detected as u32,
            opportunities_executed: executed as u32,
            max_drawdown: parse_decimal(&drawdown)?,
        })
    }

    async fn update_daily_stats(&self, stats: &DailyStats) -> StoreResult<()> {
        let Some(date) = stats.date else {
            return Err(StoreError::Backend("daily stats require a date".to_string()));
        };
        let mut conn = self.conn()?;
        diesel::replace_into(schema::daily_stats::table)
            .values((
                schema::daily_stats::date.eq(date.to_string()),
                schema::daily_stats::trade_count.eq(stats.trade_count as i32),
                schema::daily_stats::volume_usd.eq(stats.volume_usd.to_string()),
                schema::daily_stats::realized_pnl.eq(stats.realized_pnl.to_string()),
                schema::daily_stats::positions_opened.eq(stats.positions_opened as i32),
                schema::daily_stats::positions_closed.eq(stats.positions_closed as i32),
                schema::daily_stats::wins.eq(stats.wins as i32),
                schema::daily_stats::losses.eq(stats.losses as i32),
                schema::daily_stats::exposure.eq(stats.exposure.to_string()),
                schema::daily_stats::opportunities_detected.eq(stats.opportunities_detected as i32),
                schema::daily_stats::opportunities_executed.eq(stats.opportunities_executed as i32),
                schema::daily_stats::max_drawdown.eq(stats.max_drawdown.to_string()),
            ))
            .execute(&mut conn)
            .map_err(to_backend)?;
        Ok(())
    }

    async fn increment_daily_stats(&self, date: NaiveDate, field: DailyStatsField, amount: Decimal) -> StoreResult<()> {
        let mut stats = self.get_daily_stats(date).await?;
        stats.date = Some(date);
        match field {
            DailyStatsField::TradeCount => stats.trade_count += amount.try_into().unwrap_or(0u32),
            DailyStatsField::VolumeUsd => stats.volume_usd += amount,
            DailyStatsField::PositionsOpened => stats.positions_opened += amount.try_into().unwrap_or(0u32),
            DailyStatsField::PositionsClosed => stats.positions_closed += amount.try_into().unwrap_or(0u32),
            DailyStatsField::Wins => stats.wins += amount.try_into().unwrap_or(0u32),
            DailyStatsField::Losses => stats.losses += amount.try_into().unwrap_or(0u32),
            DailyStatsField::OpportunitiesDetected => stats.opportunities_detected += amount.try_into().unwrap_or(0u32),
            DailyStatsField::OpportunitiesExecuted => stats.opportunities_executed += amount.try_into().unwrap_or(0u32),
        }
        self.update_daily_stats(&stats).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{ConditionId, SignalId, TokenId};
    use rust_decimal_macros::dec;

    fn store() -> SqliteStore {
        SqliteStore::connect(":memory:").expect("in-memory sqlite always connects")
    }

    #[tokio::test]
    async fn save_and_load_trade_round_trips() {
        let store = store();
        let trade = Trade {
            trade_id: "t1".to_string(),
            market_id: MarketId::new("m1"),
            strategy_name: "gabagool".to_string(),
            signal_id: SignalId::generate(),
            yes_order_id: None,
            no_order_id: None,
            position_id: None,
            status: TradeStatus::Open,
            created_at: Utc::now(),
            resolved_at: None,
        };
        store.save_trade(&trade).await.unwrap();
        let loaded = store.get_trade("t1").await.unwrap().unwrap();
        assert_eq!(loaded.trade_id, "t1");
        assert_eq!(loaded.status, TradeStatus::Open);
    }

    #[tokio::test]
    async fn resolve_trade_updates_status() {
        let store = store();
        let trade = Trade {
            trade_id: "t1".to_string(),
            market_id: MarketId::new("m1"),
            strategy_name: "gabagool".to_string(),
            signal_id: SignalId::generate(),
            yes_order_id: None,
            no_order_id: None,
            position_id: None,
            status: TradeStatus::Open,
            created_at: Utc::now(),
            resolved_at: None,
        };
        store.save_trade(&trade).await.unwrap();
        store.resolve_trade("t1", Utc::now()).await.unwrap();
        let loaded = store.get_trade("t1").await.unwrap().unwrap();
        assert_eq!(loaded.status, TradeStatus::Resolved);
    }

    #[tokio::test]
    async fn record_claim_attempt_is_serialized_by_transaction() {
        let store = store();
        let entry = SettlementQueueEntry {
            position_id: PositionId::new("p1"),
            market_id: MarketId::new("m1"),
            condition_id: ConditionId::new("c1"),
            token_id: TokenId::new("yes"),
            side: Outcome::Yes,
            size: dec!(10),
            entry_price: dec!(0.45),
            entry_cost: dec!(4.5),
            market_end_time: Utc::now(),
            status: ClaimStatus::Pending,
            claim_attempts: 0,
            last_claim_error: None,
            next_retry_at: None,
            claimed_at: None,
            claim_proceeds: None,
            claim_profit: None,
        };
        store.queue_for_settlement(&entry).await.unwrap();
        let attempts = store
            .record_claim_attempt(&PositionId::new("p1"), "timeout", Utc::now())
            .await
            .unwrap();
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn record_realized_pnl_accumulates_same_day() {
        let store = store();
        let now = Utc::now();
        store
            .record_realized_pnl("t1", dec!(10), PnlType::Resolution, dec!(500), now)
            .await
            .unwrap();
        let outcome = store
            .record_realized_pnl("t2", dec!(-20), PnlType::Resolution, dec!(500), now)
            .await
            .unwrap();
        assert_eq!(outcome.realized_pnl, dec!(-10));
    }
}
