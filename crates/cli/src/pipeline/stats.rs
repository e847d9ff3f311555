//! Run statistics.

use std::time::Duration;

use observability::OutcomeSummary;

/// Statistics from one dispatch run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Change notifications read from the input
    pub records: u64,

    /// Batch formatter invocations
    pub batches: u64,

    /// Total duration of the run
    pub duration: Duration,

    /// Outcomes, routes and transport latency
    pub summary: OutcomeSummary,
}

impl RunStats {
    /// Records settled per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.summary.total as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Dispatch Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Records read: {}", self.records);
        println!("   ├─ Batches: {}", self.batches);
        println!("   └─ Throughput: {:.2} records/s", self.throughput());

        println!("\n{}", self.summary);
    }
}
