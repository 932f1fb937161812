//! Settlement queue entries tracking on-chain redemption of resolved positions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{ConditionId, MarketId, PositionId, TokenId};
use super::money::{Price, Size, Usd};
use super::order::Outcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimStatus {
    Pending,
    Claimed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementQueueEntry {
    pub position_id: PositionId,
    pub market_id: MarketId,
    pub condition_id: ConditionId,
    pub token_id: TokenId,
    pub side: Outcome,
    pub size: Size,
    pub entry_price: Price,
    pub entry_cost: Usd,
    pub market_end_time: DateTime<Utc>,
    pub status: ClaimStatus,
    pub claim_attempts: u32,
    pub last_claim_error: Option<String>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub claim_proceeds: Option<Usd>,
    pub claim_profit: Option<Decimal>,
}

impl SettlementQueueEntry {
    #[must_use]
    pub fn invariant_holds(&self) -> bool {
        match self.status {
            ClaimStatus::Claimed => self.claimed_at.is_some() && self.claim_proceeds.is_some(),
            _ => true,
        }
    }

    pub fn mark_claimed(&mut self, proceeds: Usd, profit: Decimal, now: DateTime<Utc>) {
        self.status = ClaimStatus::Claimed;
        self.claimed_at = Some(now);
        self.claim_proceeds = Some(proceeds);
        self.claim_profit = Some(profit);
    }
}

/// Compute `(proceeds, profit)` for a resolved market.
#[must_use]
pub fn compute_proceeds(shares: Size, cost: Usd, side: Outcome, resolution: Outcome) -> (Usd, Decimal) {
    if side == resolution {
        (shares, shares - cost)
    } else {
        (Decimal::ZERO, -cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn winning_side_proceeds_equal_shares() {
        let (proceeds, profit) = compute_proceeds(dec!(22.22), dec!(4.50), Outcome::Yes, Outcome::Yes);
        assert_eq!(proceeds, dec!(22.22));
        assert_eq!(profit, dec!(17.72));
    }

    #[test]
    fn losing_side_proceeds_are_zero() {
        let (proceeds, profit) = compute_proceeds(dec!(22.22), dec!(4.50), Outcome::No, Outcome::Yes);
        assert_eq!(proceeds, dec!(0));
        assert_eq!(profit, dec!(-4.50));
    }

    #[test]
    fn claimed_invariant() {
        let mut entry = SettlementQueueEntry {
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
        assert!(entry.invariant_holds());
        entry.mark_claimed(dec!(10), dec!(5.5), Utc::now());
        assert!(entry.invariant_holds());
        assert_eq!(entry.status, ClaimStatus::Claimed);
    }
}
