//! 分发指标收集模块
//!
//! Prometheus counters/histograms for record outcomes, batches and
//! transport latency, plus an in-memory aggregator for run summaries.

use std::collections::BTreeMap;

use contracts::RecordOutcome;
use metrics::{counter, gauge, histogram};

/// 记录单条记录的最终结果
pub fn record_outcome(destination: &str, outcome: RecordOutcome) {
    counter!(
        "cdc_outbound_records_total",
        "destination" => destination.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// 记录一次批量格式化
pub fn record_batch(destination: &str, size: usize) {
    counter!(
        "cdc_outbound_batches_total",
        "destination" => destination.to_string()
    )
    .increment(1);
    histogram!(
        "cdc_outbound_batch_size",
        "destination" => destination.to_string()
    )
    .record(size as f64);
}

/// 记录传输耗时
pub fn record_transport_latency_ms(transport: &str, latency_ms: f64) {
    histogram!(
        "cdc_outbound_transport_latency_ms",
        "transport" => transport.to_string()
    )
    .record(latency_ms);
}

/// 记录传输队列深度
pub fn record_queue_depth(transport: &str, depth: usize) {
    gauge!(
        "cdc_outbound_transport_queue_depth",
        "transport" => transport.to_string()
    )
    .set(depth as f64);
}

/// Outcome aggregator
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct OutcomeAggregator {
    /// Records per outcome
    pub outcomes: BTreeMap<&'static str, u64>,

    /// Records per route
    pub routes: BTreeMap<String, u64>,

    /// 批大小统计
    pub batch_stats: RunningStats,

    /// 传输耗时统计
    pub latency_stats: RunningStats,
}

impl OutcomeAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_outcome(&mut self, outcome: RecordOutcome) {
        *self.outcomes.entry(outcome.as_str()).or_insert(0) += 1;
    }

    pub fn record_route(&mut self, route: impl Into<String>) {
        *self.routes.entry(route.into()).or_insert(0) += 1;
    }

    pub fn record_batch(&mut self, size: usize) {
        self.batch_stats.push(size as f64);
    }

    pub fn record_latency_ms(&mut self, latency_ms: f64) {
        self.latency_stats.push(latency_ms);
    }

    pub fn count(&self, outcome: RecordOutcome) -> u64 {
        self.outcomes.get(outcome.as_str()).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.outcomes.values().sum()
    }

    /// 生成摘要报告
    pub fn summary(&self) -> OutcomeSummary {
        let total = self.total();
        let rate = |n: u64| {
            if total > 0 {
                n as f64 / total as f64 * 100.0
            } else {
                0.0
            }
        };

        OutcomeSummary {
            total,
            dispatched: self.count(RecordOutcome::Dispatched),
            skipped: self.count(RecordOutcome::Skipped),
            temporary_failures: self.count(RecordOutcome::TemporaryFailure),
            permanent_failures: self.count(RecordOutcome::PermanentFailure),
            redelivery_rate: rate(self.count(RecordOutcome::TemporaryFailure)),
            batch_size: StatsSummary::from(&self.batch_stats),
            transport_latency_ms: StatsSummary::from(&self.latency_stats),
            routes: self.routes.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct OutcomeSummary {
    pub total: u64,
    pub dispatched: u64,
    pub skipped: u64,
    pub temporary_failures: u64,
    pub permanent_failures: u64,
    pub redelivery_rate: f64,
    pub batch_size: StatsSummary,
    pub transport_latency_ms: StatsSummary,
    pub routes: BTreeMap<String, u64>,
}

impl std::fmt::Display for OutcomeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Dispatch Summary ===")?;
        writeln!(f, "Total records: {}", self.total)?;
        writeln!(f, "Dispatched: {}", self.dispatched)?;
        writeln!(f, "Skipped: {}", self.skipped)?;
        writeln!(
            f,
            "Temporary failures: {} ({:.2}%)",
            self.temporary_failures, self.redelivery_rate
        )?;
        writeln!(f, "Permanent failures: {}", self.permanent_failures)?;
        writeln!(f, "Batch size: {}", self.batch_size)?;
        writeln!(f, "Transport latency (ms): {}", self.transport_latency_ms)?;

        if !self.routes.is_empty() {
            writeln!(f, "Routes:")?;
            for (route, count) in &self.routes {
                writeln!(f, "  {}: {}", route, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_counts() {
        let mut aggregator = OutcomeAggregator::new();
        aggregator.record_outcome(RecordOutcome::Dispatched);
        aggregator.record_outcome(RecordOutcome::Dispatched);
        aggregator.record_outcome(RecordOutcome::TemporaryFailure);
        aggregator.record_outcome(RecordOutcome::Skipped);
        aggregator.record_route("other:internal");
        aggregator.record_batch(3);

        let summary = aggregator.summary();
        assert_eq!(summary.total, 4);
        assert_eq!(summary.dispatched, 2);
        assert_eq!(summary.temporary_failures, 1);
        assert_eq!(summary.permanent_failures, 0);
        assert!((summary.redelivery_rate - 25.0).abs() < 1e-10);
        assert_eq!(summary.routes.get("other:internal"), Some(&1));
        assert_eq!(summary.batch_size.count, 1);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = OutcomeAggregator::new();
        for _ in 0..3 {
            aggregator.record_outcome(RecordOutcome::Dispatched);
        }
        aggregator.record_outcome(RecordOutcome::TemporaryFailure);

        let output = aggregator.summary().to_string();
        assert!(output.contains("Total records: 4"));
        assert!(output.contains("25.00%"));
        assert!(output.contains("Batch size: N/A"));
    }
}
