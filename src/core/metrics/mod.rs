//! Metrics registry: named counters/gauges for the engine's Prometheus
//! series, recorded through the `metrics` facade so the exporter
//! backend is swappable.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::domain::BreakerLevel;

pub const TRADES_TOTAL: &str = "trades_total";
pub const PNL_REALIZED: &str = "pnl_realized";
pub const EXECUTION_QUEUE_DEPTH: &str = "execution_queue_depth";
pub const EXECUTION_LATENCY_MS: &str = "execution_latency_ms";
pub const SETTLEMENT_CLAIMS_TOTAL: &str = "settlement_claims_total";
pub const SETTLEMENT_CLAIM_FAILURES_TOTAL: &str = "settlement_claim_failures_total";
pub const OPPORTUNITIES_DETECTED_TOTAL: &str = "opportunities_detected_total";
pub const OPPORTUNITIES_EXECUTED_TOTAL: &str = "opportunities_executed_total";
pub const CIRCUIT_BREAKER_LEVEL: &str = "circuit_breaker_level";
pub const ACTIVE_MARKETS: &str = "active_markets";

/// Installs the process-wide Prometheus recorder and returns a handle
/// whose `render()` produces the scrape body. Call once at startup.
pub fn install() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("prometheus recorder installs exactly once per process")
}

pub fn record_trade(market_id: &str, side: &str, dry_run: bool) {
    metrics::counter!(TRADES_TOTAL, "market" => market_id.to_string(), "side" => side.to_string(), "dry_run" => dry_run.to_string())
        .increment(1);
}

pub fn record_pnl(amount: rust_decimal::Decimal) {
    use rust_decimal::prelude::ToPrimitive;
    metrics::gauge!(PNL_REALIZED).set(amount.to_f64().unwrap_or(0.0));
}

pub fn record_queue_depth(depth: usize) {
    metrics::gauge!(EXECUTION_QUEUE_DEPTH).set(depth as f64);
}

pub fn record_execution_latency_ms(millis: i64) {
    metrics::histogram!(EXECUTION_LATENCY_MS).record(millis as f64);
}

pub fn record_settlement_claimed() {
    metrics::counter!(SETTLEMENT_CLAIMS_TOTAL).increment(1);
}

pub fn record_settlement_claim_failure() {
    metrics::counter!(SETTLEMENT_CLAIM_FAILURES_TOTAL).increment(1);
}

pub fn record_opportunity_detected(market_id: &str) {
    metrics::counter!(OPPORTUNITIES_DETECTED_TOTAL, "market" => market_id.to_string()).increment(1);
}

pub fn record_opportunity_executed(market_id: &str) {
    metrics::counter!(OPPORTUNITIES_EXECUTED_TOTAL, "market" => market_id.to_string()).increment(1);
}

pub fn record_circuit_breaker_level(level: BreakerLevel) {
    let value = match level {
        BreakerLevel::Normal => 0.0,
        BreakerLevel::Warning => 1.0,
        BreakerLevel::Caution => 2.0,
        BreakerLevel::Halt => 3.0,
    };
    metrics::gauge!(CIRCUIT_BREAKER_LEVEL).set(value);
}

pub fn record_active_markets(count: usize) {
    metrics::gauge!(ACTIVE_MARKETS).set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circuit_breaker_level_maps_in_order() {
        assert_eq!(
            [BreakerLevel::Normal, BreakerLevel::Warning, BreakerLevel::Caution, BreakerLevel::Halt]
                .iter()
                .map(|l| match l {
                    BreakerLevel::Normal => 0.0,
                    BreakerLevel::Warning => 1.0,
                    BreakerLevel::Caution => 2.0,
                    BreakerLevel::Halt => 3.0,
                })
                .collect::<Vec<f64>>(),
            vec![0.0, 1.0, 2.0, 3.0]
        );
    }

    #[test]
    fn recording_functions_do_not_panic_without_installed_recorder() {
        record_trade("m1", "buy", true);
        record_pnl(rust_decimal_macros::dec!(12.5));
        record_queue_depth(3);
        record_execution_latency_ms(42);
        record_settlement_claimed();
        record_settlement_claim_failure();
        record_opportunity_detected("m1");
        record_opportunity_executed("m1");
        record_circuit_breaker_level(BreakerLevel::Warning);
        record_active_markets(2);
    }
}
