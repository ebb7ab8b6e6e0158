//! The worker loop: one thread of control per worker.
//!
//! A worker cycles between waiting for input and running the iteration
//! body until it reaches one of two terminal states: it consumed its stop
//! signal (report the final local scope, exit) or a body invocation failed
//! (report the failure, stop consuming, exit). Either way it emits exactly
//! one terminal message over its lifetime; the send and the `return` are
//! adjacent so a second report is unrepresentable.
//!
//! The body's normal return value is discarded. The only externally
//! observable effect of an iteration is mutation of this worker's private
//! scope copy.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, warn};

use crate::executor::message::{WorkerFailure, WorkerMessage, WorkerResult};
use crate::variable::SharedScope;
use crate::value::Value;

/// The iteration body: invoked once per task with the item and the
/// worker's private scope. Errors abort the whole region.
pub type IterationBody = dyn Fn(Value, &mut SharedScope) -> anyhow::Result<()> + Send + Sync;

/// Everything a worker needs at startup: the body and the fan-out snapshot
/// of the shared scope. Each worker clones the snapshot into its own
/// private copy, so no state is ambient and nothing is shared mutably.
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub(crate) body: Arc<IterationBody>,
    pub(crate) scope: SharedScope,
}

pub(crate) fn run(
    worker_id: usize,
    context: WorkerContext,
    tasks: Receiver<WorkerMessage>,
    results: Sender<WorkerResult>,
    shutdown: Arc<AtomicBool>,
    poll_interval: Duration,
) {
    let mut scope = context.scope;

    loop {
        if shutdown.load(Ordering::Relaxed) {
            // Forceful teardown: exit without a terminal report, the
            // coordinator has already stopped listening.
            return;
        }

        let message = match tasks.recv_timeout(poll_interval) {
            Ok(message) => message,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return,
        };

        match message {
            WorkerMessage::Task(task) => {
                if let Err(error) = (context.body)(task.item, &mut scope) {
                    warn!(worker_id, task_index = task.index, "iteration body failed");
                    let failure = WorkerFailure::from_error(worker_id, task.index, &error);
                    let _ = results.send(WorkerResult::Failure(failure));
                    return;
                }
            }
            WorkerMessage::Stop => {
                debug!(worker_id, "worker draining");
                let _ = results.send(WorkerResult::Success {
                    worker_id,
                    finals: scope.finals(),
                });
                return;
            }
        }
    }
}
