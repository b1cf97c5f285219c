//! Typed values crossing the codec boundary

use serde::{Deserialize, Serialize};

/// A decoded process value.
///
/// `Unsigned` exists so that uint64 registers survive a decode/encode
/// round-trip for the full range instead of being squeezed through `i64`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
}

impl Value {
    /// Numeric view of the value; booleans map to 0.0 / 1.0.
    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            },
            Value::Integer(i) => *i as f64,
            Value::Unsigned(u) => *u as f64,
            Value::Float(f) => *f,
        }
    }

    /// Boolean view; any non-zero numeric is true.
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::Unsigned(u) => *u != 0,
            Value::Float(f) => *f != 0.0,
        }
    }

    /// Signed integer view, rounding floats.
    pub fn as_i64(&self) -> i64 {
        match self {
            Value::Bool(b) => i64::from(*b),
            Value::Integer(i) => *i,
            Value::Unsigned(u) => *u as i64,
            Value::Float(f) => f.round() as i64,
        }
    }

    /// Unsigned integer view, rounding floats and clamping negatives to 0.
    pub fn as_u64(&self) -> u64 {
        match self {
            Value::Bool(b) => u64::from(*b),
            Value::Integer(i) => (*i).max(0) as u64,
            Value::Unsigned(u) => *u,
            Value::Float(f) => f.round().max(0.0) as u64,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Unsigned(u) => write!(f, "{u}"),
            Value::Float(v) => write!(f, "{v}"),
        }
    }
}
