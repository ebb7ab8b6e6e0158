//! Shared variables and the scope that declares them.
//!
//! A [`SharedValue`] is one value plus the strategy that merges it. A
//! [`SharedScope`] is the set of named shared variables participating in one
//! parallel region, declared explicitly by the caller. Only declared
//! bindings are eligible for cross-worker merge; nothing is discovered by
//! scanning ambient state.
//!
//! Ownership over a region's lifetime: the caller's scope is the canonical
//! copy before and after the region. At fan-out every worker receives its
//! own clone of the scope and mutates only that clone, so no two execution
//! units ever hold a reference to the same `SharedValue`. The canonical
//! copy is written exactly once, at merge time.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::aggregation::AggregationStrategy;
use crate::error::{Error, Result};
use crate::value::{Value, ValueKind};

/// One value bound to its aggregation strategy.
#[derive(Debug, Clone)]
pub struct SharedValue {
    value: Value,
    declared_kind: ValueKind,
    strategy: Arc<dyn AggregationStrategy>,
}

impl SharedValue {
    /// Wraps `value` with its merge strategy. The strategy's admission
    /// check runs here, once; it is not re-validated on later assignments.
    pub fn new(value: Value, strategy: Arc<dyn AggregationStrategy>) -> Result<Self> {
        strategy.compatible(&value)?;
        Ok(Self {
            declared_kind: value.kind(),
            value,
            strategy,
        })
    }

    /// The current value, cloned out of the box.
    pub fn get(&self) -> Value {
        self.value.clone()
    }

    /// Replaces the wrapped value.
    ///
    /// The replacement must match the kind the variable was declared with.
    /// The one permitted coercion is numeric widening: an `Int` assigned to
    /// a `Float`-declared variable is stored as a `Float`.
    pub fn assign(&mut self, value: Value) -> Result<()> {
        let incoming = value.kind();
        if incoming == self.declared_kind {
            self.value = value;
            return Ok(());
        }
        if self.declared_kind == ValueKind::Float && incoming == ValueKind::Int {
            self.value = Value::Float(value.as_f64()?);
            return Ok(());
        }
        Err(Error::TypeMismatch {
            expected: self.declared_kind,
            found: incoming,
        })
    }

    pub fn strategy(&self) -> &Arc<dyn AggregationStrategy> {
        &self.strategy
    }
}

/// The named shared variables of one parallel region.
///
/// The iteration body reads and writes variables through this scope by
/// name; inside a worker the scope it sees is that worker's private clone.
#[derive(Debug, Clone, Default)]
pub struct SharedScope {
    vars: BTreeMap<String, SharedValue>,
}

impl SharedScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a variable. Runs the strategy's admission check and rejects
    /// duplicate names.
    pub fn declare(
        &mut self,
        name: impl Into<String>,
        value: Value,
        strategy: Arc<dyn AggregationStrategy>,
    ) -> Result<()> {
        let name = name.into();
        if self.vars.contains_key(&name) {
            return Err(Error::Config(format!(
                "shared variable '{}' is already declared",
                name
            )));
        }
        self.vars.insert(name, SharedValue::new(value, strategy)?);
        Ok(())
    }

    /// The current value of a variable, cloned.
    pub fn get(&self, name: &str) -> Result<Value> {
        self.vars
            .get(name)
            .map(SharedValue::get)
            .ok_or_else(|| Error::UnknownVariable(name.to_string()))
    }

    /// Replaces a variable's value, subject to the kind check in
    /// [`SharedValue::assign`].
    pub fn assign(&mut self, name: &str, value: Value) -> Result<()> {
        self.vars
            .get_mut(name)
            .ok_or_else(|| Error::UnknownVariable(name.to_string()))?
            .assign(value)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Snapshot of every variable's current value, keyed by name. This is
    /// what a worker reports as its terminal state.
    pub(crate) fn finals(&self) -> BTreeMap<String, Value> {
        self.vars
            .iter()
            .map(|(name, var)| (name.clone(), var.get()))
            .collect()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &SharedValue)> {
        self.vars.iter()
    }

    pub(crate) fn var_mut(&mut self, name: &str) -> Result<&mut SharedValue> {
        self.vars
            .get_mut(name)
            .ok_or_else(|| Error::UnknownVariable(name.to_string()))
    }
}
