//! Per-signal latency accounting and rolling statistics.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionLatency {
    pub signal_received_at: Option<DateTime<Utc>>,
    pub queue_entered_at: Option<DateTime<Utc>>,
    pub queue_exited_at: Option<DateTime<Utc>>,
    pub submission_started_at: Option<DateTime<Utc>>,
    pub submission_completed_at: Option<DateTime<Utc>>,
    pub fill_completed_at: Option<DateTime<Utc>>,
}

fn millis_between(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Option<i64> {
    Some((end? - start?).num_milliseconds())
}

impl ExecutionLatency {
    #[must_use]
    pub fn queue_time_ms(&self) -> Option<i64> {
        millis_between(self.queue_entered_at, self.queue_exited_at)
    }

    #[must_use]
    pub fn submission_time_ms(&self) -> Option<i64> {
        millis_between(self.submission_started_at, self.submission_completed_at)
    }

    #[must_use]
    pub fn fill_time_ms(&self) -> Option<i64> {
        millis_between(self.submission_completed_at, self.fill_completed_at)
    }

    #[must_use]
    pub fn total_latency_ms(&self) -> Option<i64> {
        millis_between(self.signal_received_at, self.fill_completed_at)
    }
}

/// Rolling latency statistics for completed executions, backed by a
/// lock-guarded `Vec` rather than a dedicated histogram crate; the
/// sample window is bounded so long-running processes don't grow this
/// unboundedly.
pub struct LatencyStats {
    samples: Mutex<Vec<i64>>,
    target_ms: i64,
    max_samples: usize,
}

impl LatencyStats {
    #[must_use]
    pub fn new(target_ms: i64) -> Self {
        Self {
            samples: Mutex::new(Vec::new()),
            target_ms,
            max_samples: 10_000,
        }
    }

    pub fn record(&self, total_latency_ms: i64) {
        let mut samples = self.samples.lock();
        samples.push(total_latency_ms);
        if samples.len() > self.max_samples {
            let overflow = samples.len() - self.max_samples;
            samples.drain(0..overflow);
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> LatencySnapshot {
        let mut samples = self.samples.lock().clone();
        samples.sort_unstable();
        let count = samples.len();
        if count == 0 {
            return LatencySnapshot::default();
        }
        let sum: i64 = samples.iter().sum();
        let mean_ms = sum as f64 / count as f64;
        let p95 = percentile(&samples, 0.95);
        let p99 = percentile(&samples, 0.99);
        let within_target = samples.iter().filter(|ms| **ms < self.target_ms).count();
        LatencySnapshot {
            count,
            mean_ms,
            p95_ms: p95,
            p99_ms: p99,
            within_target_fraction: within_target as f64 / count as f64,
        }
    }
}

fn percentile(sorted: &[i64], fraction: f64) -> i64 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = ((sorted.len() as f64 - 1.0) * fraction).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatencySnapshot {
    pub count: usize,
    pub mean_ms: f64,
    pub p95_ms: i64,
    pub p99_ms: i64,
    pub within_target_fraction: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn derives_phase_durations() {
        let t0 = Utc::now();
        let latency = ExecutionLatency {
            signal_received_at: Some(t0),
            queue_entered_at: Some(t0),
            queue_exited_at: Some(t0 + Duration::milliseconds(10)),
            submission_started_at: Some(t0 + Duration::milliseconds(10)),
            submission_completed_at: Some(t0 + Duration::milliseconds(40)),
            fill_completed_at: Some(t0 + Duration::milliseconds(90)),
        };
        assert_eq!(latency.queue_time_ms(), Some(10));
        assert_eq!(latency.submission_time_ms(), Some(30));
        assert_eq!(latency.fill_time_ms(), Some(50));
        assert_eq!(latency.total_latency_ms(), Some(90));
    }

    #[test]
    fn snapshot_computes_mean_and_within_target() {
        let stats = LatencyStats::new(100);
        for ms in [50, 60, 70, 80, 200] {
            stats.record(ms);
        }
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.count, 5);
        assert!((snapshot.mean_ms - 92.0).abs() < 0.01);
        assert_eq!(snapshot.within_target_fraction, 0.8);
    }

    #[test]
    fn empty_stats_snapshot_is_zeroed() {
        let stats = LatencyStats::new(100);
        assert_eq!(stats.snapshot(), LatencySnapshot::default());
    }
}
