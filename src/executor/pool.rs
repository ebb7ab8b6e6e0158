//! Worker pool: thread lifecycle and the shared channel pair.
//!
//! The pool owns N worker threads, the bounded input channel they pull
//! from, and the output channel they report on. It knows nothing about
//! loop semantics; the worker body is injected as a closure. Distribution
//! uses a single shared queue, so workers race to pull and an idle worker
//! picks up whatever is next regardless of index.
//!
//! Shutdown has two modes:
//! - graceful: the input side is closed and workers are joined as they
//!   terminate naturally (after consuming their stop signal).
//! - forceful: a shared flag is raised first, so a worker unblocks even if
//!   messages remain queued, then the input side is closed to wake any
//!   worker blocked on an empty channel.
//!
//! Dropping the pool performs a forceful shutdown, so worker threads never
//! outlive it on early-return paths.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::debug;

use crate::error::{Error, Result};
use crate::executor::thread::WORKER_ID;

pub(crate) struct WorkerPool<Msg, Out> {
    workers: Vec<thread::JoinHandle<()>>,
    pub(crate) input_tx: Option<Sender<Msg>>,
    pub(crate) output_rx: Receiver<Out>,
    shutdown: Arc<AtomicBool>,
}

impl<Msg, Out> WorkerPool<Msg, Out>
where
    Msg: Send + 'static,
    Out: Send + 'static,
{
    /// Spawns `worker_count` workers sharing one bounded input channel of
    /// `capacity` messages. The output channel holds one slot per worker,
    /// enough for every terminal report even if the coordinator is slow to
    /// drain them.
    ///
    /// `worker_fn` runs on each worker thread until it returns; it receives
    /// the worker id, both channel ends, and the shutdown flag.
    pub(crate) fn start<F>(worker_count: usize, capacity: usize, worker_fn: F) -> Result<Self>
    where
        F: Fn(usize, Receiver<Msg>, Sender<Out>, Arc<AtomicBool>) + Send + Sync + 'static,
    {
        let (input_tx, input_rx) = bounded(capacity);
        let (output_tx, output_rx) = bounded(worker_count);
        let shutdown = Arc::new(AtomicBool::new(false));
        let worker_fn = Arc::new(worker_fn);

        debug!(worker_count, capacity, "starting worker pool");

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let input_rx = input_rx.clone();
            let output_tx = output_tx.clone();
            let shutdown = shutdown.clone();
            let worker_fn = worker_fn.clone();

            let handle = thread::Builder::new()
                .name(format!("parloop-worker-{}", worker_id))
                .spawn(move || {
                    WORKER_ID.with(|id| id.set(Some(worker_id)));
                    worker_fn(worker_id, input_rx, output_tx, shutdown);
                })
                .map_err(|source| Error::Spawn { worker_id, source })?;

            workers.push(handle);
        }

        Ok(Self {
            workers,
            input_tx: Some(input_tx),
            output_rx,
            shutdown,
        })
    }
}

impl<Msg, Out> WorkerPool<Msg, Out> {
    /// Tears the pool down and joins every worker.
    ///
    /// Forceful shutdown raises the shared flag before closing the input
    /// side, so workers stop without draining queued messages; graceful
    /// shutdown only closes the input side and waits for natural
    /// termination.
    pub(crate) fn shutdown(&mut self, forceful: bool) {
        if forceful {
            self.shutdown.store(true, Ordering::Relaxed);
        }
        self.input_tx.take();

        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        debug!(forceful, "worker pool shut down");
    }
}

impl<Msg, Out> Drop for WorkerPool<Msg, Out> {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.shutdown(true);
        }
    }
}
