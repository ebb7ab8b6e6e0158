//! Aggregation strategies: the rules for combining per-worker final values.
//!
//! Each shared variable is bound to one strategy at declaration time. The
//! strategy answers two questions and nothing else:
//!
//! - `compatible`: may a variable with this initial value use this strategy
//!   at all? Checked once at declaration, never re-validated per assignment.
//! - `combine`: given the pre-region initial value and one final value per
//!   worker, what is the single merged value?
//!
//! `combine` receives the finals in arrival order, which is unspecified
//! across runs. Implementations must be invariant to permutation of that
//! sequence; this is part of the contract, not an implementation detail.
//!
//! New strategies are added by implementing [`AggregationStrategy`], not by
//! inspecting value kinds at the call site.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::value::Value;

/// The pluggable merge rule bound to a shared variable.
///
/// Implementations carry no state of their own and know nothing about the
/// worker pool; they are pure functions over values.
pub trait AggregationStrategy: fmt::Debug + Send + Sync {
    /// Strategy name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Admission check for an initial value. Returns
    /// [`Error::IncompatibleType`] when this strategy cannot merge
    /// variables seeded with `initial`.
    fn compatible(&self, initial: &Value) -> Result<()>;

    /// Merge the per-worker finals into one value. `finals` holds exactly
    /// one entry per reporting worker, in arrival order.
    fn combine(&self, initial: &Value, finals: Vec<Value>) -> Result<Value>;
}

fn incompatible(strategy: &'static str, reason: impl Into<String>) -> Error {
    Error::IncompatibleType {
        strategy,
        reason: reason.into(),
    }
}

/// Sums each worker's net contribution.
///
/// For numeric scalars and buffers every worker's private copy started equal
/// to the initial value, so subtracting the initial isolates that worker's
/// delta; the merged value is the initial plus the sum of deltas, identical
/// to what a single sequential pass would have produced. For mappings the
/// initial must be empty and the finals are unioned, summing values for keys
/// that recur across workers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sum;

impl AggregationStrategy for Sum {
    fn name(&self) -> &'static str {
        "Sum"
    }

    fn compatible(&self, initial: &Value) -> Result<()> {
        match initial {
            Value::Int(_) | Value::Float(_) | Value::Buffer(_) => Ok(()),
            Value::Map(entries) if entries.is_empty() => Ok(()),
            Value::Map(_) => Err(incompatible(
                self.name(),
                "a pre-populated mapping has ambiguous merge semantics, seed it empty",
            )),
            other => Err(incompatible(
                self.name(),
                format!("cannot sum values of kind {}", other.kind()),
            )),
        }
    }

    fn combine(&self, initial: &Value, finals: Vec<Value>) -> Result<Value> {
        match initial {
            Value::Int(start) => {
                let mut total = *start;
                for final_value in &finals {
                    total += final_value.as_i64()? - start;
                }
                Ok(Value::Int(total))
            }
            Value::Float(start) => {
                let mut total = *start;
                for final_value in &finals {
                    total += final_value.as_f64()? - start;
                }
                Ok(Value::Float(total))
            }
            Value::Buffer(start) => {
                let mut total = start.clone();
                for final_value in &finals {
                    let data = final_value.as_buffer()?;
                    if data.len() != start.len() {
                        return Err(Error::Aggregation(format!(
                            "buffer length changed from {} to {} inside a worker",
                            start.len(),
                            data.len()
                        )));
                    }
                    for (slot, (x, x0)) in total.iter_mut().zip(data.iter().zip(start)) {
                        *slot += x - x0;
                    }
                }
                Ok(Value::Buffer(total))
            }
            Value::Map(_) => {
                let mut merged: BTreeMap<String, Value> = BTreeMap::new();
                for final_value in &finals {
                    for (key, value) in final_value.as_map()? {
                        match merged.get(key) {
                            None => {
                                if !value.is_numeric() {
                                    return Err(Error::Aggregation(format!(
                                        "key {:?} holds non-numeric value {}",
                                        key, value
                                    )));
                                }
                                merged.insert(key.clone(), value.clone());
                            }
                            Some(existing) => {
                                let summed = match (existing, value) {
                                    (Value::Int(a), Value::Int(b)) => Value::Int(a + b),
                                    _ => Value::Float(existing.as_f64()? + value.as_f64()?),
                                };
                                merged.insert(key.clone(), summed);
                            }
                        }
                    }
                }
                Ok(Value::Map(merged))
            }
            other => Err(incompatible(
                self.name(),
                format!("cannot sum values of kind {}", other.kind()),
            )),
        }
    }
}

/// Concatenates each worker's contribution into one container.
///
/// Requires an empty initial container. Lists keep each worker's internal
/// order but workers interleave arbitrarily. Mappings are unioned with
/// conflict detection: the same key reported with different values by two
/// workers is an aggregation error. Buffers are appended end to end.
#[derive(Debug, Clone, Copy, Default)]
pub struct Concatenate;

impl AggregationStrategy for Concatenate {
    fn name(&self) -> &'static str {
        "Concatenate"
    }

    fn compatible(&self, initial: &Value) -> Result<()> {
        match initial {
            Value::List(_) | Value::Map(_) | Value::Buffer(_) if initial.is_empty() => Ok(()),
            Value::List(_) | Value::Map(_) | Value::Buffer(_) => Err(incompatible(
                self.name(),
                "the initial container must be empty",
            )),
            other => Err(incompatible(
                self.name(),
                format!("cannot concatenate values of kind {}", other.kind()),
            )),
        }
    }

    fn combine(&self, initial: &Value, finals: Vec<Value>) -> Result<Value> {
        match initial {
            Value::List(_) => {
                let mut merged = Vec::new();
                for final_value in &finals {
                    merged.extend(final_value.as_list()?.iter().cloned());
                }
                Ok(Value::List(merged))
            }
            Value::Map(_) => {
                let mut merged: BTreeMap<String, Value> = BTreeMap::new();
                for final_value in &finals {
                    for (key, value) in final_value.as_map()? {
                        match merged.get(key) {
                            None => {
                                merged.insert(key.clone(), value.clone());
                            }
                            Some(existing) if existing == value => {}
                            Some(existing) => {
                                return Err(Error::Aggregation(format!(
                                    "key {:?} was reported with different values: {} and {}",
                                    key, existing, value
                                )));
                            }
                        }
                    }
                }
                Ok(Value::Map(merged))
            }
            Value::Buffer(_) => {
                let mut merged = Vec::new();
                for final_value in &finals {
                    merged.extend_from_slice(final_value.as_buffer()?);
                }
                Ok(Value::Buffer(merged))
            }
            other => Err(incompatible(
                self.name(),
                format!("cannot concatenate values of kind {}", other.kind()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, Value)]) -> Value {
        Value::Map(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn sum_admits_numbers_and_empty_maps() {
        assert!(Sum.compatible(&Value::Int(0)).is_ok());
        assert!(Sum.compatible(&Value::Float(1.5)).is_ok());
        assert!(Sum.compatible(&Value::Buffer(vec![0.0; 3])).is_ok());
        assert!(Sum.compatible(&map(&[])).is_ok());

        assert!(Sum.compatible(&map(&[("seed", Value::Int(1))])).is_err());
        assert!(Sum.compatible(&Value::List(vec![])).is_err());
        assert!(Sum.compatible(&Value::Str("no".into())).is_err());
    }

    #[test]
    fn sum_adds_worker_deltas_to_the_initial() {
        // 5 + (2 + 4.5 + 3)
        let merged = Sum
            .combine(
                &Value::Float(5.0),
                vec![Value::Float(7.0), Value::Float(9.5), Value::Float(8.0)],
            )
            .unwrap();
        assert_eq!(merged, Value::Float(14.5));

        let merged = Sum
            .combine(&Value::Int(10), vec![Value::Int(13), Value::Int(14)])
            .unwrap();
        assert_eq!(merged, Value::Int(17));
    }

    #[test]
    fn sum_is_invariant_to_arrival_order() {
        let finals = vec![Value::Int(13), Value::Int(14), Value::Int(9)];
        let mut reversed = finals.clone();
        reversed.reverse();

        let forward = Sum.combine(&Value::Int(10), finals).unwrap();
        let backward = Sum.combine(&Value::Int(10), reversed).unwrap();
        assert_eq!(forward, backward);
    }

    #[test]
    fn sum_unions_maps_adding_recurring_keys() {
        let merged = Sum
            .combine(
                &map(&[]),
                vec![
                    map(&[("k1", Value::Int(1)), ("k2", Value::Int(3))]),
                    map(&[("k1", Value::Int(1)), ("k3", Value::Int(4))]),
                ],
            )
            .unwrap();
        assert_eq!(
            merged,
            map(&[
                ("k1", Value::Int(2)),
                ("k2", Value::Int(3)),
                ("k3", Value::Int(4)),
            ])
        );
    }

    #[test]
    fn sum_rejects_non_numeric_map_values() {
        let result = Sum.combine(&map(&[]), vec![map(&[("k", Value::Bool(true))])]);
        assert!(matches!(result, Err(Error::Aggregation(_))));
    }

    #[test]
    fn sum_delta_sums_buffers_elementwise() {
        let initial = Value::Buffer(vec![1.0; 5]);
        let merged = Sum
            .combine(
                &initial,
                vec![
                    Value::Buffer(vec![1.0, 2.0, 3.0, 4.0, 5.0]),
                    Value::Buffer(vec![2.0, 3.0, 4.0, 5.0, 6.0]),
                ],
            )
            .unwrap();
        assert_eq!(merged, Value::Buffer(vec![2.0, 4.0, 6.0, 8.0, 10.0]));
    }

    #[test]
    fn concatenate_requires_an_empty_seed() {
        assert!(Concatenate.compatible(&Value::List(vec![])).is_ok());
        assert!(Concatenate.compatible(&map(&[])).is_ok());
        assert!(Concatenate.compatible(&Value::Buffer(vec![])).is_ok());

        assert!(Concatenate
            .compatible(&Value::List(vec![Value::Int(1)]))
            .is_err());
        assert!(Concatenate
            .compatible(&map(&[("seed", Value::Int(1))]))
            .is_err());
        assert!(Concatenate.compatible(&Value::Buffer(vec![0.0])).is_err());
        assert!(Concatenate.compatible(&Value::Int(0)).is_err());
    }

    #[test]
    fn concatenate_chains_lists_in_arrival_order() {
        let merged = Concatenate
            .combine(
                &Value::List(vec![]),
                vec![
                    Value::List(vec![Value::Int(3), Value::Int(4)]),
                    Value::List(vec![Value::Int(5), Value::Int(6)]),
                ],
            )
            .unwrap();
        assert_eq!(
            merged,
            Value::List(vec![
                Value::Int(3),
                Value::Int(4),
                Value::Int(5),
                Value::Int(6),
            ])
        );
    }

    #[test]
    fn concatenate_unions_disjoint_maps_and_detects_conflicts() {
        let merged = Concatenate
            .combine(
                &map(&[]),
                vec![
                    map(&[("key1", Value::Bool(true)), ("key2", Value::Bool(false))]),
                    map(&[("key2", Value::Bool(false)), ("key3", Value::Int(4))]),
                ],
            )
            .unwrap();
        assert_eq!(
            merged,
            map(&[
                ("key1", Value::Bool(true)),
                ("key2", Value::Bool(false)),
                ("key3", Value::Int(4)),
            ])
        );

        let conflict = Concatenate.combine(
            &map(&[]),
            vec![map(&[("key1", Value::Int(0))]), map(&[("key1", Value::Int(1))])],
        );
        match conflict {
            Err(Error::Aggregation(message)) => {
                assert!(message.contains("different values"), "got: {}", message)
            }
            other => panic!("expected aggregation error, got {:?}", other),
        }
    }

    #[test]
    fn concatenate_appends_buffers_along_the_leading_axis() {
        let merged = Concatenate
            .combine(
                &Value::Buffer(vec![]),
                vec![
                    Value::Buffer(vec![1.0, 1.0, 1.0]),
                    Value::Buffer(vec![2.0, 2.0]),
                ],
            )
            .unwrap();
        assert_eq!(merged, Value::Buffer(vec![1.0, 1.0, 1.0, 2.0, 2.0]));
    }

    #[test]
    fn combine_over_untouched_copies_returns_the_initial() {
        let finals = vec![Value::Int(42); 4];
        assert_eq!(
            Sum.combine(&Value::Int(42), finals).unwrap(),
            Value::Int(42)
        );

        let finals = vec![Value::List(vec![]); 4];
        assert_eq!(
            Concatenate
                .combine(&Value::List(vec![]), finals)
                .unwrap(),
            Value::List(vec![])
        );
    }
}
