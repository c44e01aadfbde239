use forge_shard::{AcceleratorSpec, Backend, Inputs, RunConfig, Workload};

use crate::config::{SweepProfile, VALUE_HIGH, VALUE_LOW};
use crate::data_gen::DataGenerator;

use super::standard_configs;

pub fn configs(profile: &SweepProfile, max_threads: usize) -> Vec<RunConfig> {
    standard_configs(
        profile,
        |len| Workload::Sort { len },
        max_threads,
        Some(Backend::Accelerator(AcceleratorSpec::bitonic())),
    )
}

pub fn inputs(gen: &mut DataGenerator, len: usize) -> Inputs {
    Inputs::Sort(gen.uniform(len, VALUE_LOW, VALUE_HIGH))
}
