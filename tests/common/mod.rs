use std::sync::Arc;
use std::time::Duration;

use parloop::{LoopConfig, SharedScope, Sum, Value};

/// Config with a fast shutdown poll so teardown-heavy tests stay quick.
pub fn quick_config(workers: usize) -> LoopConfig {
    LoopConfig::builder()
        .worker_count(workers)
        .poll_interval(Duration::from_millis(10))
        .build()
}

/// Scope with a single Sum-aggregated variable.
pub fn sum_scope(name: &str, initial: Value) -> SharedScope {
    let mut scope = SharedScope::new();
    scope
        .declare(name, initial, Arc::new(Sum))
        .expect("initial value should be admissible");
    scope
}
