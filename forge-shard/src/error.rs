//! Error taxonomy for shard planning, transport and local compute.
//!
//! Failures are split by how far they reach: a configuration-scoped error
//! ends one benchmark configuration and the sweep moves on, a process-scoped
//! error stops the sweep. Correctness mismatches are not errors at all; see
//! [`crate::verify::CorrectnessMismatch`].

/// How far an error propagates through the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureScope {
    /// Fatal to the current configuration only.
    Configuration,
    /// Fatal to the whole run; the process should exit.
    Process,
}

/// Low-level cause of a [`ShardError::TransportFailure`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportFault {
    #[error("peer rank {0} disconnected")]
    PeerDisconnected(usize),
    #[error("expected {expected} message, got {got}")]
    ProtocolMismatch {
        expected: &'static str,
        got: &'static str,
    },
    #[error("payload length {actual} does not match expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("root called a rooted collective without its dataset")]
    MissingRootData,
    #[error("worker thread panicked")]
    Panicked,
    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),
}

/// Error type for shard operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShardError {
    #[error("invalid partition: worker count must be positive, got {workers}")]
    InvalidPartition { workers: usize },

    #[error("transport failure on rank {rank}: {fault}")]
    TransportFailure { rank: usize, fault: TransportFault },

    #[error("backend setup failed: {0}")]
    BackendSetupFailure(String),

    #[error("compute failed on rank {rank}: {reason}")]
    ComputeFailure { rank: usize, reason: String },

    #[error("{what} has {actual} elements, expected {expected}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("failed to record result: {0}")]
    ReportFailure(String),
}

impl ShardError {
    pub(crate) fn transport(rank: usize, fault: TransportFault) -> Self {
        ShardError::TransportFailure { rank, fault }
    }

    /// Scope of this failure under the orchestrator's propagation policy.
    pub fn scope(&self) -> FailureScope {
        match self {
            ShardError::InvalidPartition { .. } | ShardError::BackendSetupFailure(_) => {
                FailureScope::Process
            }
            ShardError::TransportFailure { .. }
            | ShardError::ComputeFailure { .. }
            | ShardError::ShapeMismatch { .. }
            | ShardError::ReportFailure(_) => FailureScope::Configuration,
        }
    }

    /// True when this error only reports that some other rank went away.
    ///
    /// Used to pick the root cause when several ranks fail in one run.
    pub fn is_cascade(&self) -> bool {
        matches!(
            self,
            ShardError::TransportFailure {
                fault: TransportFault::PeerDisconnected(_),
                ..
            }
        )
    }
}

/// Result alias for shard operations.
pub type Result<T> = std::result::Result<T, ShardError>;
