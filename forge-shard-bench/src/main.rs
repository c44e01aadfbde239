mod cli;
mod config;
mod data_gen;
mod harness;
mod logging;
mod output;
mod workloads;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::info;

use cli::ShardArgs;
use config::{max_threads, parse_size, profile_for};
use harness::run_sweep;
use output::csv::CsvLog;
use output::progress::BenchProgress;
use output::table::render_all_tables;
use workloads::build_sweep;

fn main() -> Result<()> {
    let args = ShardArgs::parse();
    logging::init_logging(&args.log_level)?;

    let kinds = args.selected_workloads().map_err(|e| anyhow!(e))?;
    let size = args
        .size
        .as_deref()
        .map(parse_size)
        .transpose()
        .map_err(|e| anyhow!(e))?;

    let max_threads = max_threads();
    let accelerator = forge_shard::accelerator_available();
    let profiles: Vec<_> = kinds
        .iter()
        .map(|&kind| profile_for(kind, size, args.fixed_size, max_threads, accelerator))
        .collect();
    let configs = build_sweep(&profiles, max_threads);

    println!("shard-bench: sequential vs. thread-pool vs. distributed");
    println!("  Host threads: {}", max_threads);
    println!(
        "  Accelerator: {}",
        if accelerator { "metal" } else { "unavailable" }
    );
    for p in &profiles {
        println!(
            "  {}: sizes {}, threads {:?}, workers {:?}",
            p.workload,
            p.sizes
                .iter()
                .map(|&n| harness::format_size(n))
                .collect::<Vec<_>>()
                .join(", "),
            p.thread_counts,
            p.worker_counts
        );
    }
    println!("  Configurations: {}", configs.len());
    println!("  Seed: {}", args.seed);
    println!("  CSV output: {}", args.csv_file);
    if let Some(ref path) = args.json_file {
        println!("  JSON output: {}", path);
    }
    println!();

    let mut csv = CsvLog::open(&args.csv_file).map_err(|e| anyhow!(e))?;
    let progress = BenchProgress::new(configs.len());
    let report = run_sweep(&configs, args.seed, Some(&mut csv), &progress);
    progress.finish();
    let report = report.context("benchmark sweep aborted")?;

    render_all_tables(&report.results);

    let summary = report.summary;
    println!(
        "\n{} reported, {} failed, {} incorrect",
        summary.reported, summary.failed, summary.mismatched
    );
    println!("CSV results written to: {}", csv.path().display());
    info!(?summary, "done");

    if let Some(ref path) = args.json_file {
        if let Err(e) = output::json::write_json(
            path,
            &report.results,
            summary,
            args.seed,
            max_threads,
        ) {
            eprintln!("Error writing JSON: {}", e);
        }
    }

    Ok(())
}
