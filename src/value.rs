//! The payload model moved across worker boundaries.
//!
//! `Value` is a closed tagged union over every type the engine can carry
//! through the task/result protocol and aggregate at merge time. Keeping the
//! set closed makes two guarantees structural: every payload is `Send`, and
//! every payload is serde-serializable, so the channel pair could be swapped
//! for a process transport without a fan-out check.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single value carried by the iteration domain or a shared variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    /// Ordered sequence with per-worker internal order preserved.
    List(Vec<Value>),
    /// String-keyed mapping. Ordered so merged results render stably.
    Map(BTreeMap<String, Value>),
    /// Flat numeric buffer, the fixed-size-array case of the value model.
    Buffer(Vec<f64>),
}

/// Discriminant of a [`Value`], used for admission and assignment checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    Int,
    Float,
    Bool,
    Str,
    List,
    Map,
    Buffer,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Bool(_) => ValueKind::Bool,
            Value::Str(_) => ValueKind::Str,
            Value::List(_) => ValueKind::List,
            Value::Map(_) => ValueKind::Map,
            Value::Buffer(_) => ValueKind::Buffer,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// True for an empty container; false for non-empty containers and all
    /// scalars.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::List(items) => items.is_empty(),
            Value::Map(entries) => entries.is_empty(),
            Value::Buffer(data) => data.is_empty(),
            _ => false,
        }
    }

    pub fn as_i64(&self) -> Result<i64> {
        match self {
            Value::Int(n) => Ok(*n),
            other => Err(Error::TypeMismatch {
                expected: ValueKind::Int,
                found: other.kind(),
            }),
        }
    }

    /// Numeric read with widening: accepts both `Int` and `Float`.
    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Value::Int(n) => Ok(*n as f64),
            Value::Float(f) => Ok(*f),
            other => Err(Error::TypeMismatch {
                expected: ValueKind::Float,
                found: other.kind(),
            }),
        }
    }

    pub fn as_list(&self) -> Result<&Vec<Value>> {
        match self {
            Value::List(items) => Ok(items),
            other => Err(Error::TypeMismatch {
                expected: ValueKind::List,
                found: other.kind(),
            }),
        }
    }

    pub fn as_map(&self) -> Result<&BTreeMap<String, Value>> {
        match self {
            Value::Map(entries) => Ok(entries),
            other => Err(Error::TypeMismatch {
                expected: ValueKind::Map,
                found: other.kind(),
            }),
        }
    }

    pub fn as_buffer(&self) -> Result<&Vec<f64>> {
        match self {
            Value::Buffer(data) => Ok(data),
            other => Err(Error::TypeMismatch {
                expected: ValueKind::Buffer,
                found: other.kind(),
            }),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Bool => "bool",
            ValueKind::Str => "str",
            ValueKind::List => "list",
            ValueKind::Map => "map",
            ValueKind::Buffer => "buffer",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            Value::Buffer(data) => {
                write!(f, "buffer[")?;
                for (i, x) in data.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", x)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Vec<f64>> for Value {
    fn from(data: Vec<f64>) -> Self {
        Value::Buffer(data)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Value::Map(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(Value::from(3).kind(), ValueKind::Int);
        assert_eq!(Value::from(3.5).kind(), ValueKind::Float);
        assert_eq!(Value::from("x").kind(), ValueKind::Str);
        assert_eq!(Value::List(vec![]).kind(), ValueKind::List);
        assert_eq!(Value::Map(BTreeMap::new()).kind(), ValueKind::Map);
        assert_eq!(Value::Buffer(vec![]).kind(), ValueKind::Buffer);
    }

    #[test]
    fn numeric_accessors_widen_but_never_narrow() {
        assert_eq!(Value::Int(7).as_f64().unwrap(), 7.0);
        assert!(Value::Float(7.0).as_i64().is_err());
        assert!(Value::Str("7".into()).as_f64().is_err());
    }

    #[test]
    fn emptiness_is_a_container_property() {
        assert!(Value::List(vec![]).is_empty());
        assert!(Value::Buffer(vec![]).is_empty());
        assert!(!Value::List(vec![Value::Int(1)]).is_empty());
        assert!(!Value::Int(0).is_empty());
    }
}
