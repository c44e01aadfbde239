//! JSON report with a host header.

use std::fs;
use std::path::Path;

use serde::Serialize;

use forge_shard::{BenchmarkResult, SweepSummary};

#[derive(Serialize)]
struct JsonReport<'a> {
    host: HostHeader,
    timestamp: String,
    seed: u64,
    summary: SweepSummary,
    results: &'a [BenchmarkResult],
}

#[derive(Serialize)]
struct HostHeader {
    threads: usize,
    accelerator: bool,
}

/// Write benchmark results to a JSON file.
pub fn write_json(
    path: &str,
    results: &[BenchmarkResult],
    summary: SweepSummary,
    seed: u64,
    max_threads: usize,
) -> Result<(), String> {
    let report = JsonReport {
        host: HostHeader {
            threads: max_threads,
            accelerator: forge_shard::accelerator_available(),
        },
        timestamp: chrono::Utc::now().to_rfc3339(),
        seed,
        summary,
        results,
    };

    let json = serde_json::to_string_pretty(&report)
        .map_err(|e| format!("JSON serialization failed: {}", e))?;

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create directory {}: {}", parent.display(), e))?;
        }
    }

    fs::write(path, json).map_err(|e| format!("Failed to write {}: {}", path, e))?;

    println!("JSON results written to: {}", path);
    Ok(())
}
