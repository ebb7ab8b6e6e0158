//! The coordinator of one parallel region.
//!
//! [`ParallelLoop::run`] owns the whole region lifecycle: start a pool,
//! distribute one task per item followed by one stop signal per worker,
//! gather exactly one terminal report per worker, merge, publish. The
//! region is fail-fast atomic: the caller's scope is either updated with
//! fully merged values or left completely untouched.
//!
//! The coordinating thread blocks at exactly two points: admitting tasks
//! into the bounded input channel and waiting for terminal reports. While
//! blocked on a full input channel it keeps one eye on the output side, so
//! a worker that fails early aborts distribution instead of deadlocking
//! behind queued work.
//!
//! A configured `iteration_timeout` covers the whole distribute-then-
//! collect phase as one deadline; there is no per-task or per-result
//! bound. Exceeding it tears the pool down forcefully and surfaces
//! [`Error::Timeout`] without merging.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::executor::config::LoopConfig;
use crate::executor::message::{Task, WorkerMessage, WorkerResult};
use crate::executor::pool::WorkerPool;
use crate::executor::worker::{self, IterationBody, WorkerContext};
use crate::value::Value;
use crate::variable::SharedScope;

/// Executes the iterations of one loop across a worker pool and merges
/// per-worker state when the region ends.
pub struct ParallelLoop {
    config: LoopConfig,
}

/// Whole-region deadline derived from `iteration_timeout`.
#[derive(Clone, Copy)]
struct Deadline {
    limit: Duration,
    at: Instant,
}

impl Deadline {
    fn exceeded(&self) -> Option<Error> {
        (Instant::now() >= self.at).then_some(Error::Timeout { limit: self.limit })
    }
}

impl ParallelLoop {
    /// Validates the configuration and builds the loop. The loop itself is
    /// reusable; every call to [`run`](Self::run) is an independent region
    /// with its own pool.
    pub fn new(config: LoopConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Runs `body` once per item across the worker pool, then merges every
    /// variable declared in `scope`.
    ///
    /// Each worker starts from a snapshot of `scope` taken here and
    /// mutates only its own copy. On success the merged values are written
    /// back into `scope`; on any failure (body error, timeout, protocol
    /// violation) the pool is reclaimed and `scope` is left exactly as it
    /// was.
    pub fn run<I, F>(&self, items: I, body: F, scope: &mut SharedScope) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
        F: Fn(Value, &mut SharedScope) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let context = WorkerContext {
            body: Arc::new(body) as Arc<IterationBody>,
            scope: scope.clone(),
        };
        let poll_interval = self.config.poll_interval;

        let mut pool = WorkerPool::start(
            self.config.worker_count,
            self.config.channel_capacity,
            move |worker_id, tasks, results, shutdown| {
                worker::run(
                    worker_id,
                    context.clone(),
                    tasks,
                    results,
                    shutdown,
                    poll_interval,
                )
            },
        )?;

        match self.drive(&pool, items) {
            Ok(arrivals) => {
                pool.shutdown(false);
                self.merge(scope, arrivals)
            }
            Err(error) => {
                warn!(%error, "parallel region failed, reclaiming workers");
                pool.shutdown(true);
                Err(error)
            }
        }
    }

    /// Distribute the whole iteration domain, then the stop signals, then
    /// block until every worker has reported. Returns the per-worker final
    /// value maps in arrival order.
    fn drive<I>(
        &self,
        pool: &WorkerPool<WorkerMessage, WorkerResult>,
        items: I,
    ) -> Result<Vec<BTreeMap<String, Value>>>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let deadline = self.config.iteration_timeout.map(|limit| Deadline {
            limit,
            at: Instant::now() + limit,
        });
        let input = match &pool.input_tx {
            Some(input) => input.clone(),
            None => {
                return Err(Error::ProtocolViolation(
                    "input channel closed before distribution".to_string(),
                ))
            }
        };
        let mut collector = Collector::new(self.config.worker_count);

        for (index, item) in items.into_iter().enumerate() {
            let task = WorkerMessage::Task(Task {
                index,
                item: item.into(),
            });
            self.send(&input, task, &pool.output_rx, &mut collector, deadline, false)?;
        }

        // One guaranteed stop signal per worker, regardless of how task
        // consumption was interleaved.
        for _ in 0..self.config.worker_count {
            self.send(
                &input,
                WorkerMessage::Stop,
                &pool.output_rx,
                &mut collector,
                deadline,
                true,
            )?;
        }
        drop(input);

        while !collector.complete() {
            let result = match deadline {
                Some(deadline) => {
                    let remaining = deadline
                        .at
                        .checked_duration_since(Instant::now())
                        .ok_or(Error::Timeout {
                            limit: deadline.limit,
                        })?;
                    pool.output_rx.recv_timeout(remaining).map_err(|e| match e {
                        RecvTimeoutError::Timeout => Error::Timeout {
                            limit: deadline.limit,
                        },
                        RecvTimeoutError::Disconnected => disconnected_without_report(),
                    })?
                }
                None => pool
                    .output_rx
                    .recv()
                    .map_err(|_| disconnected_without_report())?,
            };
            collector.accept(result, true)?;
        }

        Ok(collector.arrivals)
    }

    /// Admit one message into the bounded input channel, polling the
    /// output side while the channel is full so a fast failure surfaces
    /// immediately instead of after the rest of the domain is queued.
    fn send(
        &self,
        input: &Sender<WorkerMessage>,
        message: WorkerMessage,
        output: &Receiver<WorkerResult>,
        collector: &mut Collector,
        deadline: Option<Deadline>,
        stops_queued: bool,
    ) -> Result<()> {
        let mut pending = message;
        loop {
            if let Some(error) = deadline.and_then(|deadline| deadline.exceeded()) {
                return Err(error);
            }
            match input.try_send(pending) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(message)) => {
                    pending = message;
                    match output.recv_timeout(self.config.poll_interval) {
                        Ok(result) => collector.accept(result, stops_queued)?,
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => {
                            return Err(disconnected_without_report())
                        }
                    }
                }
                Err(TrySendError::Disconnected(_)) => {
                    // Every worker has exited, so the reason is already
                    // sitting in the output channel.
                    return Err(self.drain_failure(output));
                }
            }
        }
    }

    /// All workers are gone mid-distribution; find the failure that took
    /// the last one down.
    fn drain_failure(&self, output: &Receiver<WorkerResult>) -> Error {
        while let Ok(result) = output.try_recv() {
            if let WorkerResult::Failure(failure) = result {
                return Error::WorkerExecution(failure);
            }
        }
        disconnected_without_report()
    }

    /// Combine every declared variable's finals and publish into the
    /// caller's scope. Two passes: all combines complete before the first
    /// assignment, so a combine conflict leaves the scope untouched.
    fn merge(
        &self,
        scope: &mut SharedScope,
        arrivals: Vec<BTreeMap<String, Value>>,
    ) -> Result<()> {
        let mut merged = Vec::with_capacity(scope.len());
        for (name, var) in scope.iter() {
            let finals: Vec<Value> = arrivals
                .iter()
                .filter_map(|report| report.get(name).cloned())
                .collect();
            if finals.is_empty() {
                continue;
            }
            let combined = var.strategy().combine(&var.get(), finals)?;
            merged.push((name.clone(), combined));
        }
        for (name, value) in merged {
            scope.var_mut(&name)?.assign(value)?;
        }
        debug!(variables = scope.len(), "merged parallel region");
        Ok(())
    }
}

fn disconnected_without_report() -> Error {
    Error::ProtocolViolation(
        "workers exited without reporting a terminal result".to_string(),
    )
}

/// Tracks terminal reports: exactly one per worker, failures propagate
/// immediately, duplicates and unknown ids fail loudly.
struct Collector {
    worker_count: usize,
    reported: HashSet<usize>,
    arrivals: Vec<BTreeMap<String, Value>>,
}

impl Collector {
    fn new(worker_count: usize) -> Self {
        Self {
            worker_count,
            reported: HashSet::with_capacity(worker_count),
            arrivals: Vec::with_capacity(worker_count),
        }
    }

    fn accept(&mut self, result: WorkerResult, stops_queued: bool) -> Result<()> {
        match result {
            WorkerResult::Failure(failure) => Err(Error::WorkerExecution(failure)),
            WorkerResult::Success { worker_id, finals } => {
                if !stops_queued {
                    return Err(Error::ProtocolViolation(format!(
                        "worker {} reported success before any stop signal was queued",
                        worker_id
                    )));
                }
                if worker_id >= self.worker_count {
                    return Err(Error::ProtocolViolation(format!(
                        "terminal result from unknown worker {}",
                        worker_id
                    )));
                }
                if !self.reported.insert(worker_id) {
                    return Err(Error::ProtocolViolation(format!(
                        "worker {} reported more than one terminal result",
                        worker_id
                    )));
                }
                self.arrivals.push(finals);
                Ok(())
            }
        }
    }

    fn complete(&self) -> bool {
        self.reported.len() == self.worker_count
    }
}
