//! Run the iterations of a sequential loop on a pool of isolated workers
//! and merge per-worker state back into one coherent value.
//!
//! Calling code declares the variables that participate in the merge in a
//! [`SharedScope`], each bound to an aggregation strategy, then hands the
//! loop body to a [`ParallelLoop`] as an ordinary closure. Every worker
//! evolves its own private copy of the scope; when all iterations complete
//! the per-worker finals are reconciled into one value per variable and
//! written back, so the caller observes the same state a sequential run
//! would have produced.
//!
//! ```ignore
//! let mut scope = SharedScope::new();
//! scope.declare("total", Value::Int(0), Arc::new(Sum))?;
//!
//! let looper = ParallelLoop::new(LoopConfig::builder().worker_count(2).build())?;
//! looper.run(1..=10, |item, scope| {
//!     let total = scope.get("total")?.as_i64()?;
//!     scope.assign("total", Value::Int(total + item.as_i64()?))?;
//!     Ok(())
//! }, &mut scope)?;
//!
//! assert_eq!(scope.get("total")?, Value::Int(55));
//! ```
//!
//! The region is fail-fast atomic: a body error or timeout reclaims every
//! worker and leaves the scope untouched.

pub mod aggregation;
pub mod error;
pub mod executor;
pub mod value;
pub mod variable;

pub use aggregation::{AggregationStrategy, Concatenate, Sum};
pub use error::{Error, Result};
pub use executor::{current_worker_id, LoopConfig, LoopConfigBuilder, ParallelLoop, WorkerFailure};
pub use value::{Value, ValueKind};
pub use variable::{SharedScope, SharedValue};
