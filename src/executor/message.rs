//! The task/result protocol spoken between the coordinator and workers.
//!
//! Two bounded FIFO channels carry these messages: the input channel moves
//! [`WorkerMessage`]s from the coordinator to whichever worker pulls next,
//! and the output channel moves exactly one [`WorkerResult`] per worker
//! back. Every type here is serde-serializable so the channel pair could be
//! replaced by a process transport without reshaping the protocol.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// One unit of the iteration domain, assigned to exactly one worker.
///
/// `index` is the item's position in the source iteration order. It exists
/// for diagnostics; results carry no ordering guarantee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub index: usize,
    pub item: Value,
}

/// Input-channel message. `Stop` is the sentinel telling a worker there is
/// no more work and it should report its final state; it is injected exactly
/// once per worker after all tasks have been queued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum WorkerMessage {
    Task(Task),
    Stop,
}

/// A worker's one-time terminal report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum WorkerResult {
    /// The worker drained its tasks and consumed its stop signal; `finals`
    /// holds the final local value of every declared shared variable.
    Success {
        worker_id: usize,
        finals: BTreeMap<String, Value>,
    },
    /// The iteration body failed; the worker stopped consuming tasks.
    Failure(WorkerFailure),
}

/// Serializable record of a body failure, with enough context to
/// reconstruct a diagnostic on the coordinator side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerFailure {
    pub worker_id: usize,
    /// Source-order index of the task whose body invocation failed.
    pub task_index: usize,
    /// The body error's rendered chain, outermost first.
    pub chain: Vec<String>,
}

impl WorkerFailure {
    pub(crate) fn from_error(worker_id: usize, task_index: usize, error: &anyhow::Error) -> Self {
        Self {
            worker_id,
            task_index,
            chain: error.chain().map(|cause| cause.to_string()).collect(),
        }
    }
}

impl fmt::Display for WorkerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "iteration {} failed on worker {}",
            self.task_index, self.worker_id
        )?;
        for (depth, cause) in self.chain.iter().enumerate() {
            if depth == 0 {
                write!(f, ": {}", cause)?;
            } else {
                write!(f, "; caused by: {}", cause)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for WorkerFailure {}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn protocol_messages_survive_the_wire() {
        let message = WorkerMessage::Task(Task {
            index: 3,
            item: Value::Str("payload".into()),
        });
        let encoded = serde_json::to_string(&message).unwrap();
        let decoded: WorkerMessage = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, message);

        let result = WorkerResult::Success {
            worker_id: 1,
            finals: [("total".to_string(), Value::Int(55))].into_iter().collect(),
        };
        let encoded = serde_json::to_string(&result).unwrap();
        let decoded: WorkerResult = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, result);
    }

    #[test]
    fn failure_renders_the_whole_error_chain() {
        let error = anyhow::anyhow!("disk on fire")
            .context("loading page")
            .context("fetching article");
        let failure = WorkerFailure::from_error(2, 7, &error);

        assert_eq!(failure.chain.len(), 3);
        let rendered = failure.to_string();
        assert!(rendered.contains("iteration 7 failed on worker 2"));
        assert!(rendered.contains("fetching article"));
        assert!(rendered.contains("disk on fire"));
    }
}
