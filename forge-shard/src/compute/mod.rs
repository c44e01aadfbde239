//! Local Compute Adapter: one trait, several backends.
//!
//! Every worker gets exactly one backend instance for the duration of a run.
//! The backend sees only its own shard (plus the broadcast operand for
//! multiplication) and never talks to other workers.

pub mod parallel;
pub mod sequential;

#[cfg(all(target_os = "macos", feature = "metal"))]
pub mod metal;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::dataset::Element;
use crate::error::{Result, ShardError};

pub use parallel::ThreadPoolCompute;
pub use sequential::SequentialCompute;

/// Per-worker compute capability.
pub trait LocalCompute {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Threads (or 1 for the accelerator host side) used by this backend.
    fn threads(&self) -> usize;

    /// Multiply `rows` (whole rows of A, row-major) by the `dim x dim`
    /// operand. Returns a buffer the same length as `rows`.
    fn multiply(&mut self, rows: &[Element], operand: &[Element], dim: usize) -> Result<Vec<Element>>;

    /// Sort `shard` ascending in place.
    fn sort(&mut self, shard: &mut [Element]) -> Result<()>;
}

/// Builds one backend per rank at the start of a run.
pub trait ComputeFactory: Sync {
    fn create(&self, rank: usize) -> Result<Box<dyn LocalCompute>>;
}

/// Loop schedule for the thread-pool backend's row fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Schedule {
    /// Rayon's adaptive splitting.
    Auto,
    /// Fixed chunks of `chunk` rows dealt round-robin to threads up front.
    /// `chunk == 0` splits rows evenly, one block per thread.
    Static { chunk: usize },
    /// Fixed chunks of `chunk` rows, each an independently stealable task.
    Dynamic { chunk: usize },
    /// Chunks of `max(remaining / threads, chunk)` rows.
    Guided { chunk: usize },
}

impl Schedule {
    /// Label written to the result log.
    pub fn label(&self) -> String {
        match self {
            Schedule::Auto => "auto".to_string(),
            Schedule::Static { chunk } => format!("static:{chunk}"),
            Schedule::Dynamic { chunk } => format!("dynamic:{chunk}"),
            Schedule::Guided { chunk } => format!("guided:{chunk}"),
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Device program and entry point for the accelerator backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceleratorSpec {
    pub source: PathBuf,
    pub entry: String,
}

impl AcceleratorSpec {
    /// Bundled row-block matrix product kernel.
    pub fn matmul() -> Self {
        Self {
            source: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/matmul.metal")),
            entry: "matrix_mul".to_string(),
        }
    }

    /// Bundled bitonic sort step kernel.
    pub fn bitonic() -> Self {
        Self {
            source: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/bitonic.metal")),
            entry: "bitonic_step".to_string(),
        }
    }
}

/// Backend selection for one benchmark configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "kebab-case")]
pub enum Backend {
    Sequential,
    ThreadPool { threads: usize, schedule: Schedule },
    Accelerator(AcceleratorSpec),
}

impl Backend {
    /// Variant tag written to the result log.
    pub fn tag(&self) -> &'static str {
        match self {
            Backend::Sequential => "sequential",
            Backend::ThreadPool { .. } => "thread-pool",
            Backend::Accelerator(_) => "accelerator",
        }
    }

    pub fn threads(&self) -> usize {
        match self {
            Backend::ThreadPool { threads, .. } => *threads,
            Backend::Sequential | Backend::Accelerator(_) => 1,
        }
    }

    /// Schedule label, or `"-"` for backends without a loop schedule.
    pub fn schedule_label(&self) -> String {
        match self {
            Backend::ThreadPool { schedule, .. } => schedule.label(),
            Backend::Sequential | Backend::Accelerator(_) => "-".to_string(),
        }
    }
}

impl ComputeFactory for Backend {
    fn create(&self, rank: usize) -> Result<Box<dyn LocalCompute>> {
        match self {
            Backend::Sequential => Ok(Box::new(SequentialCompute)),
            Backend::ThreadPool { threads, schedule } => {
                Ok(Box::new(ThreadPoolCompute::new(rank, *threads, *schedule)?))
            }
            Backend::Accelerator(spec) => create_accelerator(rank, spec),
        }
    }
}

#[cfg(all(target_os = "macos", feature = "metal"))]
fn create_accelerator(rank: usize, spec: &AcceleratorSpec) -> Result<Box<dyn LocalCompute>> {
    Ok(Box::new(metal::MetalCompute::new(rank, spec)?))
}

#[cfg(not(all(target_os = "macos", feature = "metal")))]
fn create_accelerator(rank: usize, spec: &AcceleratorSpec) -> Result<Box<dyn LocalCompute>> {
    tracing::error!(rank, entry = %spec.entry, "accelerator backend not compiled in");
    Err(ShardError::BackendSetupFailure(format!(
        "accelerator `{}` unavailable: built without Metal support",
        spec.entry
    )))
}

/// Whether the accelerator backend is compiled into this build.
pub fn accelerator_available() -> bool {
    cfg!(all(target_os = "macos", feature = "metal"))
}

/// Largest square threadgroup side, at most `tile`, whose thread count fits
/// in `max_threads`. Never less than 1.
#[cfg_attr(not(all(target_os = "macos", feature = "metal")), allow(dead_code))]
pub(crate) fn square_tile(tile: usize, max_threads: usize) -> usize {
    let mut side = tile.max(1);
    while side > 1 && side * side > max_threads {
        side -= 1;
    }
    side
}

pub(crate) fn check_operand(operand: &[Element], dim: usize) -> Result<()> {
    if operand.len() != dim * dim {
        return Err(ShardError::ShapeMismatch {
            what: "operand",
            expected: dim * dim,
            actual: operand.len(),
        });
    }
    Ok(())
}
