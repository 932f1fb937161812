//! Settlement manager claim cycle against the in-memory store and
//! scripted exchange-info/redemption fakes, covering both the happy
//! path and a redemption failure that schedules a retry.

use std::sync::Arc;

use chrono::Utc;
use edgelord_core::core::bus::EventBus;
use edgelord_core::core::domain::{
    ClaimStatus, ConditionId, MarketId, Outcome, PositionId, SettlementQueueEntry, TokenId,
};
use edgelord_core::core::exchange::MarketResolution;
use edgelord_core::core::settlement::{SettlementConfig, SettlementManager};
use edgelord_core::core::store::memory::MemoryStore;
use edgelord_core::core::store::StateStore;
use edgelord_core::core::testkit::{FakeMarketInfoSource, FakeRedemptionClient};
use rust_decimal_macros::dec;

fn entry(position_id: &str) -> SettlementQueueEntry {
    SettlementQueueEntry {
        position_id: PositionId::new(position_id),
        market_id: MarketId::new("m1"),
        condition_id: ConditionId::new("m1"),
        token_id: TokenId::new("yes"),
        side: Outcome::Yes,
        size: dec!(22.22),
        entry_price: dec!(0.45),
        entry_cost: dec!(10),
        market_end_time: Utc::now() - chrono::Duration::seconds(10),
        status: ClaimStatus::Pending,
        claim_attempts: 0,
        last_claim_error: None,
        next_retry_at: None,
        claimed_at: None,
        claim_proceeds: None,
        claim_profit: None,
    }
}

fn config() -> SettlementConfig {
    SettlementConfig {
        resolution_wait_seconds: 0,
        ..Default::default()
    }
}

#[tokio::test]
async fn resolved_winning_position_is_claimed() {
    let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
    store.queue_for_settlement(&entry("p1")).await.unwrap();

    let market_info = Arc::new(FakeMarketInfoSource::resolved(Outcome::Yes));
    let redemption = Arc::new(FakeRedemptionClient::new());

    let manager = SettlementManager::new(
        config(),
        EventBus::new(),
        store.clone(),
        market_info,
        redemption.clone(),
    );

    manager.check_settlements(Utc::now()).await;

    let stored = store.get_settlement_queue_entry(&PositionId::new("p1")).await.unwrap().unwrap();
    assert_eq!(stored.status, ClaimStatus::Claimed);
    assert_eq!(stored.claim_proceeds, Some(dec!(22.22)));
    assert_eq!(redemption.claims.lock().len(), 1);
}

#[tokio::test]
async fn losing_position_claims_zero_proceeds() {
    let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
    store.queue_for_settlement(&entry("p2")).await.unwrap();

    let market_info = Arc::new(FakeMarketInfoSource::resolved(Outcome::No));
    let redemption = Arc::new(FakeRedemptionClient::new());

    let manager = SettlementManager::new(config(), EventBus::new(), store.clone(), market_info, redemption);
    manager.check_settlements(Utc::now()).await;

    let stored = store.get_settlement_queue_entry(&PositionId::new("p2")).await.unwrap().unwrap();
    assert_eq!(stored.status, ClaimStatus::Claimed);
    assert_eq!(stored.claim_proceeds, Some(dec!(0)));
    assert_eq!(stored.claim_profit, Some(dec!(-10)));
}

#[tokio::test]
async fn unresolved_market_is_left_pending() {
    let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
    store.queue_for_settlement(&entry("p3")).await.unwrap();

    let market_info = Arc::new(FakeMarketInfoSource::unresolved());
    let redemption = Arc::new(FakeRedemptionClient::new());

    let manager = SettlementManager::new(config(), EventBus::new(), store.clone(), market_info, redemption);
    manager.check_settlements(Utc::now()).await;

    let stored = store.get_settlement_queue_entry(&PositionId::new("p3")).await.unwrap().unwrap();
    assert_eq!(stored.status, ClaimStatus::Pending);
    assert_eq!(stored.claim_attempts, 0);
}

#[tokio::test]
async fn redemption_failure_schedules_a_retry() {
    let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
    store.queue_for_settlement(&entry("p4")).await.unwrap();

    let market_info = Arc::new(FakeMarketInfoSource::resolved(Outcome::Yes));
    let redemption = Arc::new(FakeRedemptionClient::new());
    redemption.fail_next_claim();

    let manager = SettlementManager::new(config(), EventBus::new(), store.clone(), market_info, redemption);
    manager.check_settlements(Utc::now()).await;

    let stored = store.get_settlement_queue_entry(&PositionId::new("p4")).await.unwrap().unwrap();
    assert_eq!(stored.status, ClaimStatus::Pending);
    assert_eq!(stored.claim_attempts, 1);
    assert!(stored.next_retry_at.is_some());
}
