//! Settlement manager: periodic claim loop over resolved positions.
//! Config with serde defaults, a bus-publishing worker, non-blocking
//! per-entry failure discipline.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::core::domain::{compute_proceeds, PositionId, SettlementQueueEntry};
use crate::core::exchange::{MarketInfoSource, MarketResolution, RedemptionClient};
use crate::core::store::StateStore;

fn default_check_interval_seconds() -> u64 {
    300
}
fn default_resolution_wait_seconds() -> i64 {
    600
}
fn default_max_claim_attempts() -> u32 {
    5
}
fn default_retry_initial_delay_seconds() -> i64 {
    60
}
fn default_retry_max_delay_seconds() -> i64 {
    3600
}
fn default_retry_exponential_base() -> f64 {
    2.0
}
fn default_retry_jitter() -> bool {
    true
}
fn default_alert_after_failures() -> u32 {
    3
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettlementConfig {
    #[serde(default = "default_check_interval_seconds")]
    pub check_interval_seconds: u64,
    #[serde(default = "default_resolution_wait_seconds")]
    pub resolution_wait_seconds: i64,
    #[serde(default = "default_max_claim_attempts")]
    pub max_claim_attempts: u32,
    #[serde(default = "default_retry_initial_delay_seconds")]
    pub retry_initial_delay_seconds: i64,
    #[serde(default = "default_retry_max_delay_seconds")]
    pub retry_max_delay_seconds: i64,
    #[serde(default = "default_retry_exponential_base")]
    pub retry_exponential_base: f64,
    #[serde(default = "default_retry_jitter")]
    pub retry_jitter: bool,
    #[serde(default = "default_alert_after_failures")]
    pub alert_after_failures: u32,
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            check_interval_seconds: default_check_interval_seconds(),
            resolution_wait_seconds: default_resolution_wait_seconds(),
            max_claim_attempts: default_max_claim_attempts(),
            retry_initial_delay_seconds: default_retry_initial_delay_seconds(),
            retry_max_delay_seconds: default_retry_max_delay_seconds(),
            retry_exponential_base: default_retry_exponential_base(),
            retry_jitter: default_retry_jitter(),
            alert_after_failures: default_alert_after_failures(),
            dry_run: false,
        }
    }
}

/// Severity carried on `settlement.alert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertSeverity {
    Warning,
    Critical,
}

#[derive(Debug, Clone)]
pub struct SettlementAlert {
    pub position_id: PositionId,
    pub severity: AlertSeverity,
    pub attempts: u32,
}

#[derive(Debug, Clone)]
pub struct SettlementFailed {
    pub position_id: PositionId,
    pub reason: String,
    pub permanent: bool,
}

#[derive(Debug, Clone)]
pub struct SettlementClaimed {
    pub position_id: PositionId,
    pub proceeds: Decimal,
    pub profit: Decimal,
}

/// `delay = min(initial * base^(attempt - 1), max)`, optionally
/// jittered by `U(0, 0.25 * delay)`.
fn backoff_delay(config: &SettlementConfig, next_attempt: u32) -> chrono::Duration {
    let raw = config.retry_initial_delay_seconds as f64
        * config.retry_exponential_base.powi(next_attempt.saturating_sub(1) as i32);
    let capped = raw.min(config.retry_max_delay_seconds as f64);
    let delay_seconds = if config.retry_jitter {
        capped + rand::thread_rng().gen_range(0.0..=0.25 * capped)
    } else {
        capped
    };
    chrono::Duration::milliseconds((delay_seconds * 1000.0) as i64)
}

pub struct SettlementManager {
    config: SettlementConfig,
    bus: crate::core::bus::EventBus,
    store: Arc<dyn StateStore>,
    market_info: Arc<dyn MarketInfoSource>,
    redemption: Arc<dyn RedemptionClient>,
}

impl SettlementManager {
    #[must_use]
    pub fn new(
        config: SettlementConfig,
        bus: crate::core::bus::EventBus,
        store: Arc<dyn StateStore>,
        market_info: Arc<dyn MarketInfoSource>,
        redemption: Arc<dyn RedemptionClient>,
    ) -> Self {
        Self {
            config,
            bus,
            store,
            market_info,
            redemption,
        }
    }

    #[must_use]
    pub fn check_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.config.check_interval_seconds)
    }

    /// Runs one pass over claimable positions. Individual entry
    /// failures are caught and reported; they never stop the cycle.
    pub async fn check_settlements(&self, now: DateTime<Utc>) {
        let claimable = match self
            .store
            .get_claimable_positions(now, self.config.max_claim_attempts, self.config.resolution_wait_seconds)
            .await
        {
            Ok(entries) => entries,
            Err(err) => {
                error!(error = %err, "failed to load claimable positions");
                return;
            }
        };

        for candidate in claimable {
            if let Err(err) = self.process_one(&candidate, now).await {
                warn!(position_id = %candidate.position_id.as_str(), error = %err, "settlement cycle entry failed");
            }
        }
    }

    async fn process_one(&self, candidate: &SettlementQueueEntry, now: DateTime<Utc>) -> Result<(), String> {
        let entry = match self
            .store
            .get_settlement_queue_entry(&candidate.position_id)
            .await
            .map_err(|e| e.to_string())?
        {
            Some(entry) => entry,
            None => return Ok(()),
        };

        let resolution = match self.market_info.resolution(&entry.condition_id).await {
            Ok(MarketResolution::Resolved(outcome)) => outcome,
            Ok(MarketResolution::Unresolved) => return Ok(()),
            Err(err) => {
                self.handle_claim_failure(&entry, &err.to_string(), now).await;
                return Ok(());
            }
        };

        let (proceeds, profit) = compute_proceeds(entry.size, entry.entry_cost, entry.side, resolution);

        if self.config.dry_run {
            return self.finalize_claim(&entry, proceeds, profit, now).await;
        }

        match self.redemption.redeem(&entry.condition_id, &entry.token_id).await {
            Ok(receipt) if receipt.success => self.finalize_claim(&entry, proceeds, profit, now).await,
            Ok(receipt) => {
                let reason = format!("redemption reported failure (tx={:?})", receipt.tx_hash);
                self.handle_claim_failure(&entry, &reason, now).await;
                Ok(())
            }
            Err(err) => {
                self.handle_claim_failure(&entry, &err.to_string(), now).await;
                Ok(())
            }
        }
    }

    async fn finalize_claim(
        &self,
        entry: &SettlementQueueEntry,
        proceeds: Decimal,
        profit: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), String> {
        self.store
            .mark_claimed(&entry.position_id, proceeds, profit, now)
            .await
            .map_err(|e| e.to_string())?;
        info!(position_id = %entry.position_id.as_str(), %proceeds, %profit, "settlement claimed");
        self.bus.publish(
            "settlement.claimed",
            SettlementClaimed {
                position_id: entry.position_id.clone(),
                proceeds,
                profit,
            },
        );
        Ok(())
    }

    async fn handle_claim_failure(&self, entry: &SettlementQueueEntry, error: &str, now: DateTime<Utc>) {
        let next_attempt = entry.claim_attempts + 1;
        let delay = backoff_delay(&self.config, next_attempt);
        let next_retry_at = now + delay;

        let new_attempts = match self
            .store
            .record_claim_attempt(&entry.position_id, error, next_retry_at)
            .await
        {
            Ok(attempts) => attempts,
            Err(err) => {
                error!(position_id = %entry.position_id.as_str(), error = %err, "failed to record claim attempt");
                return;
            }
        };

        if new_attempts == self.config.alert_after_failures {
            self.bus.publish(
                "settlement.alert",
                SettlementAlert {
                    position_id: entry.position_id.clone(),
                    severity: AlertSeverity::Warning,
                    attempts: new_attempts,
                },
            );
        }

        let permanent = new_attempts >= self.config.max_claim_attempts;
        if permanent {
            if let Err(err) = self.store.mark_settlement_failed(&entry.position_id, error).await {
                error!(position_id = %entry.position_id.as_str(), error = %err, "failed to mark settlement permanently failed");
            }
            self.bus.publish(
                "settlement.alert",
                SettlementAlert {
                    position_id: entry.position_id.clone(),
                    severity: AlertSeverity::Critical,
                    attempts: new_attempts,
                },
            );
        }

        warn!(
            position_id = %entry.position_id.as_str(),
            attempts = new_attempts,
            next_retry_at = %next_retry_at,
            permanent,
            error,
            "settlement claim failed"
        );
        self.bus.publish(
            "settlement.failed",
            SettlementFailed {
                position_id: entry.position_id.clone(),
                reason: error.to_string(),
                permanent,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_monotonically_without_jitter() {
        let config = SettlementConfig {
            retry_jitter: false,
            ..SettlementConfig::default()
        };
        let d1 = backoff_delay(&config, 1);
        let d2 = backoff_delay(&config, 2);
        let d3 = backoff_delay(&config, 3);
        assert_eq!(d1.num_seconds(), 60);
        assert_eq!(d2.num_seconds(), 120);
        assert_eq!(d3.num_seconds(), 240);
        assert!(d2 >= d1 && d3 >= d2);
    }

    #[test]
    fn backoff_caps_at_retry_max_delay() {
        let config = SettlementConfig {
            retry_jitter: false,
            ..SettlementConfig::default()
        };
        let d = backoff_delay(&config, 20);
        assert_eq!(d.num_seconds(), config.retry_max_delay_seconds);
    }

    #[test]
    fn jitter_never_shrinks_delay() {
        let config = SettlementConfig::default();
        for attempt in 1..5 {
            let jittered = backoff_delay(&config, attempt);
            let floor = chrono::Duration::seconds(
                (config.retry_initial_delay_seconds as f64 * config.retry_exponential_base.powi((attempt - 1) as i32))
                    .min(config.retry_max_delay_seconds as f64) as i64,
            );
            assert!(jittered >= floor);
        }
    }
}
