//! Append-only realized P&L ledger.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PnlType {
    Resolution,
    Settlement,
    Rebalance,
    Fees,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub trade_id: String,
    pub trade_date: NaiveDate,
    pub pnl_amount: Decimal,
    pub pnl_type: PnlType,
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Sum of ledger entries for a given date must equal the circuit
/// breaker's `realized_pnl` for that date.
#[must_use]
pub fn sum_for_date(entries: &[LedgerEntry], date: NaiveDate) -> Decimal {
    entries
        .iter()
        .filter(|e| e.trade_date == date)
        .map(|e| e.pnl_amount)
        .sum()
}
