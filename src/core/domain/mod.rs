//! Core domain types for the arbitrage engine.
//!
//! - Identifiers: [`id`]
//! - Money: [`money`]
//! - Order book: [`order_book`]
//! - Signals: [`signal`]
//! - Orders and fills: [`order`]
//! - Positions: [`position`]
//! - Settlement: [`settlement`]
//! - Risk: [`risk`]
//! - Realized P&L ledger: [`ledger`]

pub mod id;
pub mod ledger;
pub mod money;
pub mod order;
pub mod order_book;
pub mod position;
pub mod risk;
pub mod settlement;
pub mod signal;
pub mod trade;

pub use id::{ClientOrderId, ConditionId, FillId, MarketId, OrderId, PositionId, SignalId, TokenId};
pub use ledger::{LedgerEntry, PnlType};
pub use money::{is_valid_price, quantize_size, quantize_usd, Price, Size, Usd};
pub use order::{Fill, Order, OrderStatus, OrderType, Outcome, Side};
pub use order_book::{InMemoryOrderBook, MarketOrderBook, OrderBookLevel};
pub use position::{Position, PositionStatus};
pub use risk::{BreakerLevel, CircuitBreakerState, DailyStats};
pub use settlement::{compute_proceeds, ClaimStatus, SettlementQueueEntry};
pub use signal::{ApprovedSignal, Priority, SignalType, TradingSignal};
pub use trade::{Trade, TradeStatus};

use thiserror::Error;

/// Domain invariant violations, distinct from I/O or configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("price {0} is out of the valid (0,1) range")]
    InvalidPrice(rust_decimal::Decimal),
    #[error("size must be positive, got {0}")]
    NonPositiveSize(rust_decimal::Decimal),
    #[error("signal {0} has already expired")]
    SignalExpired(String),
    #[error("approved size {approved} exceeds target size {target}")]
    ApprovedSizeExceedsTarget {
        approved: rust_decimal::Decimal,
        target: rust_decimal::Decimal,
    },
}
