use clap::Parser;

use forge_shard::WorkloadKind;

use crate::config::DEFAULT_SEED;

/// Sequential vs. thread-pool vs. distributed sort and matmul benchmark
#[derive(Parser, Debug)]
#[command(name = "shard-bench", version, about)]
pub struct ShardArgs {
    /// Workloads to run: matmul, sort, or all (default)
    #[arg(value_name = "WORKLOADS")]
    pub workloads: Vec<String>,

    /// Largest problem size for every selected workload: matrix side for
    /// matmul, element count for sort (e.g. 4, 10K, 1M, 10_000). Smaller
    /// sizes down to an eighth of it are swept too.
    #[arg(long)]
    pub size: Option<String>,

    /// Run only the largest size instead of a ladder up to it
    #[arg(long)]
    pub fixed_size: bool,

    /// Append one CSV row per configuration to this file
    #[arg(long, default_value = "results/shard-bench.csv")]
    pub csv_file: String,

    /// Write a JSON report to file
    #[arg(long)]
    pub json_file: Option<String>,

    /// Seed for input generation
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Log level filter; RUST_LOG takes precedence
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

impl ShardArgs {
    /// Returns true if this is an "all" suite run.
    pub fn is_all_suite(&self) -> bool {
        self.workloads.is_empty()
            || self.workloads.iter().any(|w| w.eq_ignore_ascii_case("all"))
    }

    /// Resolve the positional workload names, in canonical order.
    pub fn selected_workloads(&self) -> Result<Vec<WorkloadKind>, String> {
        if self.is_all_suite() {
            return Ok(vec![WorkloadKind::Matmul, WorkloadKind::Sort]);
        }

        let mut selected = Vec::new();
        for name in &self.workloads {
            let kind = match name.to_ascii_lowercase().as_str() {
                "matmul" => WorkloadKind::Matmul,
                "sort" => WorkloadKind::Sort,
                _ => {
                    return Err(format!(
                        "Unknown workload '{}'. Available: matmul, sort, all",
                        name
                    ))
                }
            };
            if !selected.contains(&kind) {
                selected.push(kind);
            }
        }
        selected.sort();
        Ok(selected)
    }
}
