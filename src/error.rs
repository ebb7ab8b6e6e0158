//! Error types for the parallel loop engine.

use std::time::Duration;

use crate::executor::WorkerFailure;
use crate::value::ValueKind;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong between declaring a shared variable and
/// reading its merged value back.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The aggregation strategy rejected the initial value at declaration
    /// time. This is a one-time admission check, not re-validated per
    /// assignment.
    #[error("{strategy} cannot aggregate this initial value: {reason}")]
    IncompatibleType {
        strategy: &'static str,
        reason: String,
    },

    /// An assignment (or accessor) saw a value of the wrong kind. The only
    /// permitted coercion is numeric widening, integer to float.
    #[error("type mismatch: expected {expected}, got {found}")]
    TypeMismatch {
        expected: ValueKind,
        found: ValueKind,
    },

    /// Workers reported logically conflicting contributions at merge time.
    #[error("aggregation failed: {0}")]
    Aggregation(String),

    /// The iteration body failed inside a worker. Carries the worker id,
    /// the failing task index, and the body's rendered error chain.
    #[error("{0}")]
    WorkerExecution(WorkerFailure),

    /// The whole distribute-then-collect phase exceeded its configured
    /// bound. Workers are forcefully reclaimed before this is returned.
    #[error("parallel region exceeded its timeout of {limit:?}")]
    Timeout { limit: Duration },

    /// A worker broke the task/result protocol (duplicate terminal result,
    /// result from an unknown worker). Programming-error class: fails
    /// loudly, never retried.
    #[error("worker protocol violation: {0}")]
    ProtocolViolation(String),

    /// Rejected configuration, e.g. fewer than two workers.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The iteration body addressed a variable the scope never declared.
    #[error("unknown shared variable '{0}'")]
    UnknownVariable(String),

    #[error("failed to spawn worker thread {worker_id}")]
    Spawn {
        worker_id: usize,
        #[source]
        source: std::io::Error,
    },
}
