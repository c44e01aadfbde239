//! Sweep construction: which configurations run for each workload.

pub mod matmul;
pub mod sort;

use forge_shard::{Backend, Inputs, RunConfig, Schedule, Workload, WorkloadKind};

use crate::config::SweepProfile;
use crate::data_gen::DataGenerator;

/// Configurations for one workload profile.
pub fn configs_for(profile: &SweepProfile, max_threads: usize) -> Vec<RunConfig> {
    match profile.workload {
        WorkloadKind::Matmul => matmul::configs(profile, max_threads),
        WorkloadKind::Sort => sort::configs(profile, max_threads),
    }
}

/// Every configuration across `profiles`, grouped by worker count.
///
/// The sort is stable so configurations keep their per-workload order
/// within a worker count, and each worker count gets exactly one group.
pub fn build_sweep(profiles: &[SweepProfile], max_threads: usize) -> Vec<RunConfig> {
    let mut configs: Vec<RunConfig> = profiles
        .iter()
        .flat_map(|p| configs_for(p, max_threads))
        .collect();
    configs.sort_by_key(|c| c.workers);
    configs
}

/// Fresh inputs for `workload`.
pub fn generate_inputs(gen: &mut DataGenerator, workload: &Workload) -> Inputs {
    match *workload {
        Workload::Matmul { dim } => matmul::inputs(gen, dim),
        Workload::Sort { len } => sort::inputs(gen, len),
    }
}

/// For each size: the single-worker sequential and thread-pool configs,
/// then the distributed ones. Shared by both workloads.
fn standard_configs(
    profile: &SweepProfile,
    workload_at: fn(usize) -> Workload,
    max_threads: usize,
    accelerator: Option<Backend>,
) -> Vec<RunConfig> {
    let mut configs = Vec::new();

    for &size in &profile.sizes {
        let workload = workload_at(size);
        configs.push(RunConfig::new(1, Backend::Sequential, workload));

        let schedules = profile.schedules(size);
        for &threads in &profile.thread_counts {
            for &schedule in &schedules {
                configs.push(RunConfig::new(
                    1,
                    Backend::ThreadPool { threads, schedule },
                    workload,
                ));
            }
        }

        for &workers in &profile.worker_counts {
            configs.push(RunConfig::new(workers, Backend::Sequential, workload));
            configs.push(RunConfig::new(
                workers,
                Backend::ThreadPool {
                    threads: profile.hybrid_threads(workers, max_threads),
                    schedule: Schedule::Auto,
                },
                workload,
            ));
            if profile.accelerator {
                if let Some(backend) = &accelerator {
                    configs.push(RunConfig::new(workers, backend.clone(), workload));
                }
            }
        }
    }

    configs
}
