//! Sweep execution: drives the orchestrator and records every result.

use std::io;

use tracing::debug;

use forge_shard::{
    BenchmarkResult, Orchestrator, ResultSink, RunConfig, RunOutcome, SweepSummary,
};

use crate::data_gen::DataGenerator;
use crate::output::csv::CsvLog;
use crate::output::progress::BenchProgress;
use crate::workloads::generate_inputs;

/// Sink that appends each result to the CSV log and keeps a copy for the
/// tables and JSON report.
struct Recorder<'a> {
    csv: Option<&'a mut CsvLog>,
    results: Vec<BenchmarkResult>,
}

impl ResultSink for Recorder<'_> {
    fn report(&mut self, result: &BenchmarkResult) -> io::Result<()> {
        if let Some(csv) = self.csv.as_deref_mut() {
            csv.append(result)?;
        }
        self.results.push(result.clone());
        Ok(())
    }
}

/// Everything a finished sweep produced.
pub struct SweepReport {
    pub results: Vec<BenchmarkResult>,
    pub summary: SweepSummary,
}

/// Run `configs` in order with inputs drawn from a generator seeded with
/// `seed`.
///
/// Each configuration gets freshly generated inputs. Returns `Err` only if
/// a process-scoped failure aborted the sweep.
pub fn run_sweep(
    configs: &[RunConfig],
    seed: u64,
    csv: Option<&mut CsvLog>,
    progress: &BenchProgress,
) -> forge_shard::Result<SweepReport> {
    let mut gen = DataGenerator::new(seed);
    let mut recorder = Recorder {
        csv,
        results: Vec::with_capacity(configs.len()),
    };

    let finished = |_: &RunConfig, _: &RunOutcome| progress.tick();
    let mut orchestrator = Orchestrator::new(&mut recorder).with_observer(&finished);
    let mut next = configs.iter();
    let summary = orchestrator.sweep(configs, |workload| {
        if let Some(config) = next.next() {
            progress.update(&format!(
                "{} {} workers={} {}",
                workload.kind(),
                format_size(workload.size()),
                config.workers,
                config.variant
            ));
        }
        debug!(?workload, "generating inputs");
        generate_inputs(&mut gen, workload)
    })?;

    Ok(SweepReport {
        results: recorder.results,
        summary,
    })
}

pub fn format_size(size: usize) -> String {
    if size >= 1_000_000 && size % 1_000_000 == 0 {
        format!("{}M", size / 1_000_000)
    } else if size >= 1_000 && size % 1_000 == 0 {
        format!("{}K", size / 1_000)
    } else {
        format!("{}", size)
    }
}

/// Microseconds as `us`, `ms` or `s`, whichever reads best.
pub fn format_duration_us(us: u64) -> String {
    if us >= 1_000_000 {
        format!("{:.2} s", us as f64 / 1_000_000.0)
    } else if us >= 1_000 {
        format!("{:.2} ms", us as f64 / 1_000.0)
    } else {
        format!("{} us", us)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{matmul_profile, sort_profile};
    use crate::workloads::build_sweep;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(4), "4");
        assert_eq!(format_size(10_000), "10K");
        assert_eq!(format_size(2_000_000), "2M");
        assert_eq!(format_size(1_500), "1500");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration_us(999), "999 us");
        assert_eq!(format_duration_us(1_500), "1.50 ms");
        assert_eq!(format_duration_us(2_000_000), "2.00 s");
    }

    #[test]
    fn test_small_sweep_all_correct() {
        let configs = build_sweep(
            &[
                matmul_profile(vec![3, 5], 2, false),
                sort_profile(vec![250, 500], 2, false),
            ],
            2,
        );
        let dir = tempfile::tempdir().unwrap();
        let mut csv = CsvLog::open(dir.path().join("sweep.csv")).unwrap();
        let progress = BenchProgress::hidden();

        let report = run_sweep(&configs, 42, Some(&mut csv), &progress).unwrap();

        assert_eq!(report.summary.reported, configs.len());
        assert_eq!(report.summary.failed, 0);
        assert_eq!(report.summary.mismatched, 0);
        assert!(report.results.iter().all(|r| r.correct));
        assert_eq!(progress.position(), configs.len() as u64);

        let text = std::fs::read_to_string(csv.path()).unwrap();
        assert_eq!(text.lines().count(), configs.len() + 1);
    }

    #[test]
    fn test_sweep_without_csv() {
        let configs = build_sweep(&[sort_profile(vec![0], 2, false)], 2);
        let report = run_sweep(&configs, 1, None, &BenchProgress::hidden()).unwrap();
        assert_eq!(report.results.len(), configs.len());
    }
}
