//! Data partitioning and reassembly for distributed benchmark runs.
//!
//! A dataset is planned into contiguous shards ([`ShardTable`]), scattered
//! over a fixed [`WorkerGroup`], computed on per-worker backends
//! ([`LocalCompute`]) and gathered back at the root, by placement for
//! matrix products and by K-way merge for sorts. The [`Orchestrator`] runs
//! that pipeline once per benchmark configuration.

pub mod compute;
pub mod dataset;
pub mod error;
pub mod merge;
pub mod orchestrator;
pub mod plan;
pub mod result;
pub mod timing;
pub mod transport;
pub mod verify;

pub use compute::{
    accelerator_available, AcceleratorSpec, Backend, ComputeFactory, LocalCompute, Schedule,
};
pub use dataset::{format_matrix, Element, Matrix};
pub use error::{FailureScope, Result, ShardError, TransportFault};
pub use merge::{merge_regions, merge_sorted_runs};
pub use orchestrator::{
    Inputs, Lifecycle, Orchestrator, Phase, RunConfig, RunOutcome, SweepSummary, Workload,
};
pub use plan::ShardTable;
pub use result::{BenchmarkResult, ResultSink, WorkloadKind};
pub use timing::BenchTimer;
pub use transport::{Shard, SharedOperand, WorkerContext, WorkerGroup};
pub use verify::{verify_product, verify_sort, CorrectnessMismatch, Verdict};
