//! Benchmark result records and the reporting seam.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which workload a result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadKind {
    Matmul,
    Sort,
}

impl WorkloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::Matmul => "matmul",
            WorkloadKind::Sort => "sort",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the result log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub workload: WorkloadKind,
    /// Human-readable variant, e.g. `distributed+thread-pool`.
    pub variant: String,
    pub workers: usize,
    pub threads: usize,
    pub schedule: String,
    /// Matrix side for matmul, element count for sort.
    pub size: usize,
    pub duration_us: u64,
    pub correct: bool,
}

impl BenchmarkResult {
    pub fn elapsed(&self) -> Duration {
        Duration::from_micros(self.duration_us)
    }
}

/// Destination for finished results.
///
/// Reporting is a side effect outside the timed region. A sink error ends
/// the configuration as [`crate::ShardError::ReportFailure`] and the sweep
/// moves on.
pub trait ResultSink {
    fn report(&mut self, result: &BenchmarkResult) -> std::io::Result<()>;
}

impl ResultSink for Vec<BenchmarkResult> {
    fn report(&mut self, result: &BenchmarkResult) -> std::io::Result<()> {
        self.push(result.clone());
        Ok(())
    }
}
