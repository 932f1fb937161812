//! Execution engine: bounded priority queue, concurrent worker pool,
//! single-order and dual-leg state machines.

pub mod latency;

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::core::bus::EventBus;
use crate::core::domain::{
    ApprovedSignal, ClientOrderId, MarketOrderBook, Order, OrderId, OrderStatus, OrderType, Outcome, Position,
    PositionId, PositionStatus, Priority, SignalId, Side,
};
use crate::core::exchange::{build_dual_leg_requests, ExchangeClient, ExchangeError, OrderRequest};

use self::latency::{ExecutionLatency, LatencyStats};

fn default_max_queue_size() -> usize {
    1000
}
fn default_max_concurrent() -> usize {
    8
}
fn default_queue_timeout_seconds() -> i64 {
    30
}
fn default_order_timeout_seconds() -> i64 {
    10
}
fn default_shutdown_grace_seconds() -> u64 {
    5
}
fn default_unwind_slippage() -> Decimal {
    rust_decimal_macros::dec!(0.02)
}
fn default_min_hedge_ratio() -> Decimal {
    rust_decimal_macros::dec!(0.80)
}
fn default_latency_target_ms() -> i64 {
    100
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_queue_timeout_seconds")]
    pub queue_timeout_seconds: i64,
    #[serde(default = "default_order_timeout_seconds")]
    pub order_timeout_seconds: i64,
    #[serde(default = "default_shutdown_grace_seconds")]
    pub shutdown_grace_seconds: u64,
    #[serde(default)]
    pub rebalance_enabled: bool,
    #[serde(default = "default_unwind_slippage")]
    pub unwind_slippage: Decimal,
    #[serde(default = "default_min_hedge_ratio")]
    pub min_hedge_ratio: Decimal,
    #[serde(default = "default_latency_target_ms")]
    pub latency_target_ms: i64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_queue_size: default_max_queue_size(),
            max_concurrent: default_max_concurrent(),
            queue_timeout_seconds: default_queue_timeout_seconds(),
            order_timeout_seconds: default_order_timeout_seconds(),
            shutdown_grace_seconds: default_shutdown_grace_seconds(),
            rebalance_enabled: false,
            unwind_slippage: default_unwind_slippage(),
            min_hedge_ratio: default_min_hedge_ratio(),
            latency_target_ms: default_latency_target_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuedStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Expired,
}

pub struct QueuedSignal {
    pub signal_id: SignalId,
    pub data: ApprovedSignal,
    pub priority: Priority,
    pub status: QueuedStatus,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub latency: ExecutionLatency,
}

impl QueuedSignal {
    fn new(data: ApprovedSignal, now: DateTime<Utc>) -> Self {
        let signal_id = data.signal.signal_id.clone();
        let priority = data.signal.priority;
        Self {
            signal_id,
            data,
            priority,
            status: QueuedStatus::Queued,
            queued_at: now,
            started_at: None,
            completed_at: None,
            error: None,
            latency: ExecutionLatency {
                signal_received_at: Some(now),
                queue_entered_at: Some(now),
                ..Default::default()
            },
        }
    }
}

/// Ordered `(priority, queued_at)`: lower `Priority` variant sorts
/// first (`Critical < High < Medium < Low`); ties break FIFO by
/// enqueue time. `BinaryHeap` is a max-heap, so ordering is reversed
/// to make the "highest priority, earliest" item the max element.
struct HeapEntry {
    priority: Priority,
    queued_at: DateTime<Utc>,
    signal: QueuedSignal,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.queued_at == other.queued_at
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.queued_at.cmp(&self.queued_at))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    QueueFull,
    Duplicate,
}

/// Bounded priority queue with duplicate-`signal_id` rejection.
struct PriorityQueue {
    heap: BinaryHeap<HeapEntry>,
    seen: HashSet<SignalId>,
    capacity: usize,
}

impl PriorityQueue {
    fn new(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::new(),
            seen: HashSet::new(),
            capacity,
        }
    }

    fn push(&mut self, signal: QueuedSignal) -> Result<(), EnqueueError> {
        if self.seen.contains(&signal.signal_id) {
            return Err(EnqueueError::Duplicate);
        }
        if self.heap.len() >= self.capacity {
            return Err(EnqueueError::QueueFull);
        }
        self.seen.insert(signal.signal_id.clone());
        self.heap.push(HeapEntry {
            priority: signal.priority,
            queued_at: signal.queued_at,
            signal,
        });
        Ok(())
    }

    fn pop(&mut self) -> Option<QueuedSignal> {
        let entry = self.heap.pop()?;
        self.seen.remove(&entry.signal.signal_id);
        Some(entry.signal)
    }

    fn len(&self) -> usize {
        self.heap.len()
    }
}

pub struct ExecutionStats {
    pub total_failed: std::sync::atomic::AtomicU64,
    pub total_expired: std::sync::atomic::AtomicU64,
    pub total_completed: std::sync::atomic::AtomicU64,
}

impl Default for ExecutionStats {
    fn default() -> Self {
        Self {
            total_failed: std::sync::atomic::AtomicU64::new(0),
            total_expired: std::sync::atomic::AtomicU64::new(0),
            total_completed: std::sync::atomic::AtomicU64::new(0),
        }
    }
}

/// Outcome of a dual-leg arbitrage execution attempt.
#[derive(Debug)]
pub enum DualLegOutcome {
    Success(Position),
    PartialUnwound,
    PartialStuck { side: Outcome },
    Failed,
}

/// Drives the order lifecycle and dual-leg arbitrage executions. One
/// instance is shared across worker tasks via `Arc`.
pub struct ExecutionEngine {
    config: ExecutionConfig,
    bus: EventBus,
    exchange: Arc<dyn ExchangeClient>,
    queue: Mutex<PriorityQueue>,
    semaphore: Arc<Semaphore>,
    open_orders: Mutex<std::collections::HashMap<OrderId, Order>>,
    stats: ExecutionStats,
    latency_stats: LatencyStats,
}

impl ExecutionEngine {
    #[must_use]
    pub fn new(config: ExecutionConfig, bus: EventBus, exchange: Arc<dyn ExchangeClient>) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent));
        let queue = Mutex::new(PriorityQueue::new(config.max_queue_size));
        let latency_stats = LatencyStats::new(config.latency_target_ms);
        Self {
            config,
            bus,
            exchange,
            queue,
            semaphore,
            open_orders: Mutex::new(std::collections::HashMap::new()),
            stats: ExecutionStats::default(),
            latency_stats,
        }
    }

    pub fn enqueue(&self, signal: ApprovedSignal, now: DateTime<Utc>) -> Result<(), EnqueueError> {
        self.queue.lock().push(QueuedSignal::new(signal, now))
    }

    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Pop the next-highest-priority signal, dropping (and counting as
    /// expired) any signal older than `queue_timeout_seconds`.
    pub fn dequeue_ready(&self, now: DateTime<Utc>) -> Option<QueuedSignal> {
        loop {
            let mut signal = self.queue.lock().pop()?;
            let age = (now - signal.queued_at).num_seconds();
            if age > self.config.queue_timeout_seconds {
                signal.status = QueuedStatus::Expired;
                self.stats.total_expired.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                self.bus.publish("execution.expired", signal.signal_id.clone());
                continue;
            }
            return Some(signal);
        }
    }

    /// Acquire a concurrency permit and execute one dequeued signal.
    /// Per-signal failures are captured on the `QueuedSignal` and never
    /// propagate to the caller.
    pub async fn execute(&self, mut queued: QueuedSignal, book: &MarketOrderBook) {
        let _permit = match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };
        let now = Utc::now();
        queued.status = QueuedStatus::Running;
        queued.started_at = Some(now);
        queued.latency.queue_exited_at = Some(now);

        let deadline = Duration::seconds(self.config.order_timeout_seconds);
        let result = self.execute_dual_leg(&queued.data, book, deadline, &mut queued.latency).await;

        let completed_at = Utc::now();
        queued.completed_at = Some(completed_at);
        queued.latency.fill_completed_at = Some(completed_at);

        match result {
            Ok(outcome) => {
                queued.status = QueuedStatus::Completed;
                self.stats.total_completed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                self.bus.publish("execution.complete", queued.signal_id.clone());
                if let Some(total_ms) = queued.latency.total_latency_ms() {
                    self.latency_stats.record(total_ms);
                    self.bus.publish("execution.latency", total_ms);
                }
                info!(signal_id = %queued.signal_id, outcome = ?outcome, "execution complete");
            }
            Err(e) => {
                queued.status = QueuedStatus::Failed;
                queued.error = Some(e.to_string());
                self.stats.total_failed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                error!(signal_id = %queued.signal_id, error = %e, "execution failed");
            }
        }
    }

    #[must_use]
    pub fn latency_snapshot(&self) -> latency::LatencySnapshot {
        self.latency_stats.snapshot()
    }

    async fn submit_and_track(
        &self,
        request: OrderRequest,
        market_id: crate::core::domain::MarketId,
        deadline: Duration,
    ) -> Result<Order, ExchangeError> {
        let now = Utc::now();
        let mut order = Order::new(
            OrderId::generate(),
            request.client_order_id.clone(),
            market_id,
            request.token_id.clone(),
            request.side,
            request.outcome,
            request.size,
            request.price,
            request.order_type,
            now,
        );
        self.bus.publish("order.pending", order.clone());

        let snapshot = self.exchange.submit_order(&request).await?;
        order.order_id = snapshot.order_id.clone();
        order.transition(OrderStatus::Submitted, Utc::now());
        self.bus.publish("order.submitted", order.clone());
        self.open_orders.lock().insert(order.order_id.clone(), order.clone());

        let poll_until = Utc::now() + deadline;
        loop {
            let snapshot = self.exchange.poll_order(&order.order_id).await?;
            order.filled_size = snapshot.filled_size;
            order.status = snapshot.status;
            if order.status.is_terminal() {
                break;
            }
            if request.order_type == OrderType::Fok {
                let _ = self.exchange.cancel_order(&order.order_id).await;
                order.status = OrderStatus::Expired;
                break;
            }
            if Utc::now() >= poll_until {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        order.updated_at = Utc::now();
        self.open_orders.lock().remove(&order.order_id);

        let event = match order.status {
            OrderStatus::Filled => "order.filled",
            OrderStatus::PartiallyFilled => "order.partially_filled",
            OrderStatus::Rejected => "order.rejected",
            OrderStatus::Expired => "order.expired",
            OrderStatus::Cancelled => "order.cancelled",
            _ => "order.open",
        };
        self.bus.publish(event, order.clone());
        Ok(order)
    }

    /// Submit YES-BUY and NO-BUY concurrently under a unified deadline
    /// and resolve the outcome per the fill/timeout/reject policy table
    /// below.
    async fn execute_dual_leg(
        &self,
        approved: &ApprovedSignal,
        book: &MarketOrderBook,
        deadline: Duration,
        latency: &mut ExecutionLatency,
    ) -> Result<DualLegOutcome, ExchangeError> {
        let signal = &approved.signal;
        let combined = signal.yes_price + signal.no_price;
        let (yes_shares, no_shares) = if combined > Decimal::ZERO {
            let budget = approved.approved_size_usd;
            (
                budget * signal.yes_price / combined / signal.yes_price,
                budget * signal.no_price / combined / signal.no_price,
            )
        } else {
            return Err(ExchangeError::Rejected("zero combined price".to_string()));
        };
        let (yes_req, no_req) = build_dual_leg_requests(book, yes_shares, no_shares, signal.yes_price, signal.no_price)?;

        latency.submission_started_at = Some(Utc::now());
        self.bus.publish("order.dual_leg.started", signal.signal_id.clone());

        let (yes_result, no_result) = tokio::join!(
            self.submit_and_track(yes_req, signal.market_id.clone(), deadline),
            self.submit_and_track(no_req, signal.market_id.clone(), deadline)
        );
        latency.submission_completed_at = Some(Utc::now());

        let yes_order = yes_result?;
        let no_order = no_result?;

        let yes_filled = yes_order.status == OrderStatus::Filled;
        let no_filled = no_order.status == OrderStatus::Filled;

        match (yes_filled, no_filled) {
            (true, true) => {
                let position = Position {
                    position_id: PositionId::generate(),
                    market_id: signal.market_id.clone(),
                    condition_id: crate::core::domain::ConditionId::new(signal.market_id.as_str()),
                    yes_token_id: signal.yes_token_id.clone(),
                    no_token_id: signal.no_token_id.clone(),
                    yes_size: yes_order.filled_size,
                    no_size: no_order.filled_size,
                    yes_avg_price: yes_order.price,
                    no_avg_price: no_order.price,
                    status: PositionStatus::Open,
                    opened_at: Utc::now(),
                    closed_at: None,
                    realized_pnl: None,
                    settlement_proceeds: None,
                };
                self.bus.publish("order.dual_leg.completed", signal.signal_id.clone());
                self.bus.publish("position.opened", position.clone());
                Ok(DualLegOutcome::Success(position))
            }
            (true, false) => {
                self.bus.publish("order.dual_leg.partial", signal.signal_id.clone());
                self.unwind_or_stick(&yes_order, Outcome::Yes, signal.market_id.clone()).await
            }
            (false, true) => {
                self.bus.publish("order.dual_leg.partial", signal.signal_id.clone());
                self.unwind_or_stick(&no_order, Outcome::No, signal.market_id.clone()).await
            }
            (false, false) => {
                self.bus.publish("order.dual_leg.failed", signal.signal_id.clone());
                Ok(DualLegOutcome::Failed)
            }
        }
    }

    /// Attempt to unwind a filled leg (SELL at best bid with bounded
    /// slippage) when its counterpart leg never filled.
    async fn unwind_or_stick(
        &self,
        filled_order: &Order,
        side: Outcome,
        market_id: crate::core::domain::MarketId,
    ) -> Result<DualLegOutcome, ExchangeError> {
        let (best_bid, _) = self.exchange.top_of_book(&filled_order.token_id).await?;
        let Some(best_bid) = best_bid else {
            warn!(order_id = %filled_order.order_id, "no bid to unwind against, leaving leg open");
            self.bus.publish("execution.alert", filled_order.order_id.clone());
            return Ok(DualLegOutcome::PartialStuck { side });
        };
        let min_acceptable = filled_order.price * (Decimal::ONE - self.config.unwind_slippage);
        if best_bid < min_acceptable {
            warn!(order_id = %filled_order.order_id, "unwind price below slippage bound, leaving leg open");
            self.bus.publish("execution.alert", filled_order.order_id.clone());
            return Ok(DualLegOutcome::PartialStuck { side });
        }
        let unwind_request = OrderRequest {
            client_order_id: ClientOrderId::generate(),
            token_id: filled_order.token_id.clone(),
            side: Side::Sell,
            outcome: side,
            size: filled_order.filled_size,
            price: best_bid,
            order_type: OrderType::Fok,
        };
        match self
            .submit_and_track(unwind_request, market_id, Duration::seconds(self.config.order_timeout_seconds))
            .await
        {
            Ok(order) if order.status == OrderStatus::Filled => Ok(DualLegOutcome::PartialUnwound),
            _ => {
                self.bus.publish("execution.alert", filled_order.order_id.clone());
                Ok(DualLegOutcome::PartialStuck { side })
            }
        }
    }

    #[must_use]
    pub fn total_failed(&self) -> u64 {
        self.stats.total_failed.load(std::sync::atomic::Ordering::Relaxed)
    }

    #[must_use]
    pub fn total_expired(&self) -> u64 {
        self.stats.total_expired.load(std::sync::atomic::Ordering::Relaxed)
    }

    #[must_use]
    pub fn total_completed(&self) -> u64 {
        self.stats.total_completed.load(std::sync::atomic::Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{MarketId, SignalId, SignalType, TokenId};
    use rust_decimal_macros::dec;

    fn signal() -> ApprovedSignal {
        let now = Utc::now();
        let trading_signal = crate::core::domain::TradingSignal {
            signal_id: SignalId::generate(),
            strategy_name: "gabagool".to_string(),
            market_id: MarketId::new("m1"),
            signal_type: SignalType::Arbitrage,
            priority: Priority::Critical,
            confidence: dec!(0.9),
            target_size_usd: dec!(10),
            yes_price: dec!(0.45),
            no_price: dec!(0.5),
            yes_token_id: TokenId::new("yes"),
            no_token_id: TokenId::new("no"),
            expected_pnl: dec!(1),
            max_slippage: dec!(0.01),
            created_at: now,
            expires_at: now + Duration::seconds(30),
            metadata: None,
        };
        ApprovedSignal::new(trading_signal, dec!(10), now)
    }

    #[test]
    fn queue_orders_by_priority_then_fifo() {
        let mut queue = PriorityQueue::new(10);
        let now = Utc::now();
        let mut low = QueuedSignal::new(signal(), now);
        low.priority = Priority::Low;
        let mut critical = QueuedSignal::new(signal(), now + Duration::milliseconds(1));
        critical.priority = Priority::Critical;
        queue.push(low).unwrap();
        queue.push(critical).unwrap();
        assert_eq!(queue.pop().unwrap().priority, Priority::Critical);
        assert_eq!(queue.pop().unwrap().priority, Priority::Low);
    }

    #[test]
    fn duplicate_signal_id_rejected() {
        let mut queue = PriorityQueue::new(10);
        let s = signal();
        let now = Utc::now();
        let a = QueuedSignal::new(s.clone(), now);
        let mut b = QueuedSignal::new(s.clone(), now);
        b.signal_id = a.signal_id.clone();
        queue.push(a).unwrap();
        assert_eq!(queue.push(b), Err(EnqueueError::Duplicate));
    }

    #[test]
    fn queue_full_rejected() {
        let mut queue = PriorityQueue::new(1);
        queue.push(QueuedSignal::new(signal(), Utc::now())).unwrap();
        assert_eq!(
            queue.push(QueuedSignal::new(signal(), Utc::now())),
            Err(EnqueueError::QueueFull)
        );
    }
}
