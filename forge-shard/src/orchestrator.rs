//! Per-configuration pipeline: plan, scatter/broadcast, compute,
//! gather/merge, verify, report.
//!
//! Every variant, including the plain sequential and thread-pool ones, runs
//! through the same pipeline; a local variant is simply a one-worker group.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, info_span, warn};

use crate::compute::{Backend, ComputeFactory};
use crate::dataset::{Element, Matrix};
use crate::error::{FailureScope, Result, ShardError};
use crate::plan::ShardTable;
use crate::result::{BenchmarkResult, ResultSink, WorkloadKind};
use crate::timing::BenchTimer;
use crate::transport::WorkerGroup;
use crate::verify::{verify_product, verify_sort, Verdict};

/// Shape of one benchmark problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Workload {
    Matmul { dim: usize },
    Sort { len: usize },
}

impl Workload {
    pub fn kind(&self) -> WorkloadKind {
        match self {
            Workload::Matmul { .. } => WorkloadKind::Matmul,
            Workload::Sort { .. } => WorkloadKind::Sort,
        }
    }

    /// Matrix side for matmul, element count for sort.
    pub fn size(&self) -> usize {
        match self {
            Workload::Matmul { dim } => *dim,
            Workload::Sort { len } => *len,
        }
    }
}

/// Generated input data for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inputs {
    Matmul { a: Matrix, b: Matrix },
    Sort(Vec<Element>),
}

impl Inputs {
    /// The workload these inputs describe.
    pub fn workload(&self) -> Workload {
        match self {
            Inputs::Matmul { a, .. } => Workload::Matmul { dim: a.dim() },
            Inputs::Sort(data) => Workload::Sort { len: data.len() },
        }
    }
}

/// One point of the benchmark sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub variant: String,
    pub workers: usize,
    pub backend: Backend,
    pub workload: Workload,
}

impl RunConfig {
    /// Config whose variant label is derived from the backend and worker
    /// count: `sequential`, `thread-pool`, or `distributed+<backend>`.
    pub fn new(workers: usize, backend: Backend, workload: Workload) -> Self {
        let variant = if workers == 1 {
            backend.tag().to_string()
        } else {
            format!("distributed+{}", backend.tag())
        };
        Self {
            variant,
            workers,
            backend,
            workload,
        }
    }
}

/// Lifecycle states of one configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Planned,
    Scattered,
    Computed,
    Gathered,
    Verified,
    Reported,
    Failed,
}

impl Phase {
    fn successor(self) -> Option<Phase> {
        match self {
            Phase::Planned => Some(Phase::Scattered),
            Phase::Scattered => Some(Phase::Computed),
            Phase::Computed => Some(Phase::Gathered),
            Phase::Gathered => Some(Phase::Verified),
            Phase::Verified => Some(Phase::Reported),
            Phase::Reported | Phase::Failed => None,
        }
    }
}

/// Ordered trace of the phases a configuration passed through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lifecycle {
    phases: Vec<Phase>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            phases: vec![Phase::Planned],
        }
    }
}

impl Lifecycle {
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn current(&self) -> Phase {
        self.phases.last().copied().unwrap_or(Phase::Planned)
    }

    pub fn is_failed(&self) -> bool {
        self.current() == Phase::Failed
    }

    fn advance(&mut self, next: Phase) {
        debug_assert_eq!(
            self.current().successor(),
            Some(next),
            "illegal transition {:?} -> {next:?}",
            self.current()
        );
        self.phases.push(next);
    }

    fn fail(&mut self) {
        if !self.is_failed() {
            self.phases.push(Phase::Failed);
        }
    }
}

fn advance(trace: &Mutex<Lifecycle>, next: Phase) {
    trace
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .advance(next);
}

/// Everything known about one configuration after it finished.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub lifecycle: Lifecycle,
    pub result: Option<BenchmarkResult>,
    pub verdict: Option<Verdict>,
    /// Set when a configuration-scoped failure ended the run.
    pub error: Option<ShardError>,
}

/// Counts over a whole sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub reported: usize,
    pub failed: usize,
    pub mismatched: usize,
}

impl SweepSummary {
    fn record(&mut self, outcome: &RunOutcome) {
        match &outcome.result {
            Some(result) => {
                self.reported += 1;
                if !result.correct {
                    self.mismatched += 1;
                }
            }
            None => self.failed += 1,
        }
    }
}

/// Drives configurations through the pipeline and hands results to a sink.
pub struct Orchestrator<'a> {
    sink: &'a mut dyn ResultSink,
    factory: Option<&'a dyn ComputeFactory>,
    observer: Option<&'a dyn Fn(&RunConfig, &RunOutcome)>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(sink: &'a mut dyn ResultSink) -> Self {
        Self {
            sink,
            factory: None,
            observer: None,
        }
    }

    /// Build every backend from `factory` instead of each config's
    /// [`Backend`].
    pub fn with_factory(mut self, factory: &'a dyn ComputeFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Call `observer` after each configuration of a sweep finishes,
    /// whether it was reported or failed.
    pub fn with_observer(mut self, observer: &'a dyn Fn(&RunConfig, &RunOutcome)) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Run every configuration in order.
    ///
    /// Consecutive configurations with the same worker count share one
    /// [`WorkerGroup`]; the group is torn down before the next count starts.
    /// A configuration-scoped failure is counted and the sweep moves on; a
    /// process-scoped failure ends the sweep with that error.
    pub fn sweep<F>(&mut self, configs: &[RunConfig], mut inputs_for: F) -> Result<SweepSummary>
    where
        F: FnMut(&Workload) -> Inputs,
    {
        let mut summary = SweepSummary::default();
        for batch in configs.chunk_by(|a, b| a.workers == b.workers) {
            let group = WorkerGroup::new(batch[0].workers)?;
            for config in batch {
                let inputs = inputs_for(&config.workload);
                let outcome = self.run(&group, config, &inputs)?;
                summary.record(&outcome);
                if let Some(observe) = self.observer {
                    observe(config, &outcome);
                }
            }
            debug!(workers = group.size(), "worker group torn down");
        }
        info!(
            reported = summary.reported,
            failed = summary.failed,
            mismatched = summary.mismatched,
            "sweep finished"
        );
        Ok(summary)
    }

    /// Run one configuration on an established group.
    ///
    /// Returns `Err` only for process-scoped failures. A configuration
    /// failure comes back as an outcome whose lifecycle ends in
    /// [`Phase::Failed`].
    pub fn run(&mut self, group: &WorkerGroup, config: &RunConfig, inputs: &Inputs) -> Result<RunOutcome> {
        let span = info_span!(
            "run",
            workload = %config.workload.kind(),
            variant = %config.variant,
            workers = config.workers,
            size = config.workload.size(),
        );
        let _enter = span.enter();

        let factory: &dyn ComputeFactory = match self.factory {
            Some(f) => f,
            None => &config.backend,
        };
        let trace = Mutex::new(Lifecycle::default());

        let measured = check_shapes(group, config, inputs).and_then(|()| match inputs {
            Inputs::Matmul { a, b } => run_matmul(group, factory, a, b, &trace),
            Inputs::Sort(data) => run_sort(group, factory, data, &trace),
        });
        let mut lifecycle = trace.into_inner().unwrap_or_else(PoisonError::into_inner);

        let (output, elapsed) = match measured {
            Ok(v) => v,
            Err(err) => return fail(lifecycle, err),
        };
        lifecycle.advance(Phase::Gathered);

        let verdict = match inputs {
            Inputs::Matmul { a, b } => verify_product(a.as_slice(), b.as_slice(), a.dim(), &output),
            Inputs::Sort(data) => verify_sort(data, &output),
        };
        if let Some(mismatch) = verdict.mismatch() {
            warn!(%mismatch, "result does not match reference");
        }
        lifecycle.advance(Phase::Verified);

        let result = BenchmarkResult {
            workload: config.workload.kind(),
            variant: config.variant.clone(),
            workers: config.workers,
            threads: config.backend.threads(),
            schedule: config.backend.schedule_label(),
            size: config.workload.size(),
            duration_us: u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
            correct: verdict.is_correct(),
        };
        if let Err(e) = self.sink.report(&result) {
            let err = ShardError::ReportFailure(e.to_string());
            warn!(error = %err, "configuration failed");
            lifecycle.fail();
            return Ok(RunOutcome {
                lifecycle,
                result: None,
                verdict: Some(verdict),
                error: Some(err),
            });
        }
        lifecycle.advance(Phase::Reported);

        info!(
            duration_us = result.duration_us,
            correct = result.correct,
            "configuration complete"
        );
        Ok(RunOutcome {
            lifecycle,
            result: Some(result),
            verdict: Some(verdict),
            error: None,
        })
    }
}

fn fail(mut lifecycle: Lifecycle, err: ShardError) -> Result<RunOutcome> {
    match err.scope() {
        FailureScope::Process => {
            error!(error = %err, "fatal failure, aborting sweep");
            Err(err)
        }
        FailureScope::Configuration => {
            warn!(error = %err, after = ?lifecycle.current(), "configuration failed");
            lifecycle.fail();
            Ok(RunOutcome {
                lifecycle,
                result: None,
                verdict: None,
                error: Some(err),
            })
        }
    }
}

fn check_shapes(group: &WorkerGroup, config: &RunConfig, inputs: &Inputs) -> Result<()> {
    if group.size() != config.workers {
        return Err(ShardError::ShapeMismatch {
            what: "worker group",
            expected: config.workers,
            actual: group.size(),
        });
    }
    let given = inputs.workload();
    if given != config.workload {
        return Err(ShardError::ShapeMismatch {
            what: "inputs",
            expected: config.workload.size(),
            actual: given.size(),
        });
    }
    Ok(())
}

fn root_output(outputs: Vec<Option<(Vec<Element>, Duration)>>) -> Result<(Vec<Element>, Duration)> {
    outputs
        .into_iter()
        .next()
        .flatten()
        .ok_or_else(|| ShardError::ComputeFailure {
            rank: 0,
            reason: "root produced no output".to_string(),
        })
}

fn run_matmul(
    group: &WorkerGroup,
    factory: &dyn ComputeFactory,
    a: &Matrix,
    b: &Matrix,
    trace: &Mutex<Lifecycle>,
) -> Result<(Vec<Element>, Duration)> {
    let dim = a.dim();
    if b.dim() != dim {
        return Err(ShardError::ShapeMismatch {
            what: "operand",
            expected: dim * dim,
            actual: b.as_slice().len(),
        });
    }
    let elements = ShardTable::plan(dim, group.size())?.scaled(dim);

    let outputs = group.run(|ctx| {
        ctx.barrier()?;
        ctx.attach(factory)?;
        ctx.barrier()?;

        let root = ctx.is_root();
        let timer = root.then(BenchTimer::start);

        let mut shard = ctx.scatter(root.then_some(a.as_slice()), &elements)?;
        let operand = ctx.broadcast(root.then_some(b.as_slice()))?;
        if root {
            advance(trace, Phase::Scattered);
        }

        let product = ctx.compute()?.multiply(shard.as_slice(), &operand, dim)?;
        shard.replace(product)?;
        if root {
            advance(trace, Phase::Computed);
        }

        let gathered = ctx.gather(shard, &elements)?;
        Ok(gathered.zip(timer.map(|t| t.stop())))
    })?;

    root_output(outputs)
}

fn run_sort(
    group: &WorkerGroup,
    factory: &dyn ComputeFactory,
    data: &[Element],
    trace: &Mutex<Lifecycle>,
) -> Result<(Vec<Element>, Duration)> {
    let table = ShardTable::plan(data.len(), group.size())?;

    let outputs = group.run(|ctx| {
        ctx.barrier()?;
        ctx.attach(factory)?;
        ctx.barrier()?;

        let root = ctx.is_root();
        let timer = root.then(BenchTimer::start);

        let mut shard = ctx.scatter(root.then_some(data), &table)?;
        if root {
            advance(trace, Phase::Scattered);
        }

        ctx.compute()?.sort(shard.as_mut_slice())?;
        if root {
            advance(trace, Phase::Computed);
        }

        let merged = ctx.gather_sorted(shard, &table)?;
        Ok(merged.zip(timer.map(|t| t.stop())))
    })?;

    root_output(outputs)
}
