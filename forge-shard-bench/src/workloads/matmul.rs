use forge_shard::{AcceleratorSpec, Backend, Inputs, RunConfig, Workload};

use crate::config::{SweepProfile, VALUE_HIGH, VALUE_LOW};
use crate::data_gen::DataGenerator;

use super::standard_configs;

pub fn configs(profile: &SweepProfile, max_threads: usize) -> Vec<RunConfig> {
    standard_configs(
        profile,
        |dim| Workload::Matmul { dim },
        max_threads,
        Some(Backend::Accelerator(AcceleratorSpec::matmul())),
    )
}

/// Two random `dim x dim` operands.
pub fn inputs(gen: &mut DataGenerator, dim: usize) -> Inputs {
    let a = gen.matrix(dim, VALUE_LOW, VALUE_HIGH);
    let b = gen.matrix(dim, VALUE_LOW, VALUE_HIGH);
    Inputs::Matmul { a, b }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::matmul_profile;

    #[test]
    fn test_matmul_config_count() {
        // 1 sequential + 2 thread counts x 11 schedules + 3 worker counts x 2
        let configs = configs(&matmul_profile(vec![4], 3, false), 3);
        assert_eq!(configs.len(), 1 + 2 * 11 + 3 * 2);
        assert_eq!(configs[0].variant, "sequential");
        assert!(configs[1..23].iter().all(|c| c.variant == "thread-pool"));
        assert!(configs[23..].iter().all(|c| c.variant.starts_with("distributed+")));
    }

    #[test]
    fn test_matmul_sizes_in_order() {
        let configs = configs(&matmul_profile(vec![2, 4], 2, false), 2);
        let sizes: Vec<usize> = configs.iter().map(|c| c.workload.size()).collect();
        let first_four = sizes.iter().position(|&s| s == 4).unwrap();
        assert!(sizes[..first_four].iter().all(|&s| s == 2));
        assert!(sizes[first_four..].iter().all(|&s| s == 4));
        // dim 2 sweeps chunks {1, 2}; dim 4 sweeps {1, 2, 4}
        assert_eq!(first_four, 1 + (2 + 2 * 3) + 3 * 2);
    }

    #[test]
    fn test_matmul_inputs_in_range() {
        let mut gen = DataGenerator::new(1);
        let Inputs::Matmul { a, b } = inputs(&mut gen, 6) else {
            panic!("expected matmul inputs");
        };
        assert_eq!(a.dim(), 6);
        assert_eq!(b.dim(), 6);
        assert!(a.as_slice().iter().all(|v| (VALUE_LOW..=VALUE_HIGH).contains(v)));
    }
}
