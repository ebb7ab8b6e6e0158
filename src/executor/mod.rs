//! The parallel-execution engine.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────┐
//!                 │ SharedScope  │ (declared name -> SharedValue bindings)
//!                 └──────┬───────┘
//!                        │ snapshot at fan-out
//!                        ↓
//!                 ┌──────────────┐
//!                 │ ParallelLoop │ ←──── LoopConfig (workers, timeout, ...)
//!                 └──────┬───────┘
//!                        │ Task per item, then one Stop per worker
//!                        ↓
//!                  [ WorkerPool ]  bounded input channel, shared by N workers
//!                   │    │    │
//!                   ↓    ↓    ↓    each worker: private scope copy + body
//!                  ┌──────────────┐
//!                  │ WorkerResult │  exactly one terminal report per worker
//!                  └──────┬───────┘
//!                         │ collect N, arrival order
//!                         ↓
//!                  ┌──────────────┐
//!                  │    merge     │  AggregationStrategy::combine per variable
//!                  └──────┬───────┘
//!                         │ publish
//!                         ↓
//!                 caller's SharedScope holds the merged state
//! ```
//!
//! # Module Structure
//!
//! ```text
//! src/executor/
//! ├── mod.rs        # Public API exports + architecture docs
//! ├── config.rs     # LoopConfig, builder, and validation
//! ├── message.rs    # Task / stop-signal / terminal-report protocol
//! ├── pool.rs       # Generic WorkerPool: threads, channels, shutdown
//! ├── worker.rs     # Worker loop and per-worker context
//! ├── scheduler.rs  # ParallelLoop: distribute, collect, merge
//! └── thread.rs     # Thread-local worker id
//! ```

mod config;
mod message;
mod pool;
mod scheduler;
mod thread;
mod worker;

pub use config::{LoopConfig, LoopConfigBuilder};
pub use message::{Task, WorkerFailure};
pub use scheduler::ParallelLoop;
pub use thread::current_worker_id;
pub use worker::IterationBody;
