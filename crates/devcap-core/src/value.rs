//! # Capability Values
//!
//! A [`Value`] is one declared or reported member of a capability struct.
//! Nested structs are carried as [`Value::Struct`], fixed and capped arrays
//! as [`Value::Array`].
//!
//! Numeric comparison is variant-agnostic: `Int(4)`, `Uint(4)`, `Flags(4)`
//! and `Bool`-as-0/1 all order against each other. Integers compare exactly
//! (through `i128`); anything involving a float compares as `f64`.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Member name → value, for one struct instance.
pub type Fields = BTreeMap<String, Value>;

/// A typed capability value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// Boolean feature or property. Orders as `false < true`.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer (also device sizes).
    Uint(u64),
    /// Floating point limit.
    Float(f64),
    /// Bit-flag set, already resolved from flag names to bits.
    Flags(u64),
    /// Enumerant name (e.g. a driver id or a format).
    Enum(String),
    /// Free-form string (e.g. a device name).
    Str(String),
    /// Fixed-size or capped array.
    Array(Vec<Value>),
    /// Nested struct.
    Struct(Fields),
}

/// Numeric view of a value used for ordering.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Int(i128),
    Float(f64),
}

impl Value {
    fn number(&self) -> Option<Number> {
        match self {
            Self::Bool(b) => Some(Number::Int(i128::from(*b))),
            Self::Int(n) => Some(Number::Int(i128::from(*n))),
            Self::Uint(n) | Self::Flags(n) => Some(Number::Int(i128::from(*n))),
            Self::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    /// Integer view of a numeric value, if it is integral.
    pub fn as_integer(&self) -> Option<i128> {
        match self.number()? {
            Number::Int(n) => Some(n),
            Number::Float(_) => None,
        }
    }

    /// Bit view of a value, for bitmask semantics.
    pub fn as_bits(&self) -> Option<u64> {
        match self {
            Self::Flags(b) | Self::Uint(b) => Some(*b),
            Self::Int(n) => u64::try_from(*n).ok(),
            Self::Bool(b) => Some(u64::from(*b)),
            _ => None,
        }
    }

    /// Numeric ordering between two values, `None` when either side is not
    /// numeric or the floats are unordered.
    pub fn cmp_numeric(&self, other: &Value) -> Option<Ordering> {
        match (self.number()?, other.number()?) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
            (a, b) => as_f64(a).partial_cmp(&as_f64(b)),
        }
    }

    /// Structural equality that treats numerically equal scalars as equal.
    pub fn same_as(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Array(a), Self::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_as(y))
            }
            (Self::Struct(a), Self::Struct(b)) => {
                a.len() == b.len()
                    && a
                        .iter()
                        .all(|(k, v)| b.get(k).is_some_and(|w| v.same_as(w)))
            }
            (Self::Enum(a), Self::Enum(b)) | (Self::Str(a), Self::Str(b)) => a == b,
            _ => self.cmp_numeric(other) == Some(Ordering::Equal),
        }
    }

    /// Whether a declared value leaves its field unconstrained.
    ///
    /// Zero, `false`, the empty string and arrays/structs made only of unset
    /// members are unset. Queue-family carry-over inherits these from the
    /// matched target group.
    pub fn is_unset(&self) -> bool {
        match self {
            Self::Bool(b) => !b,
            Self::Int(n) => *n == 0,
            Self::Uint(n) | Self::Flags(n) => *n == 0,
            Self::Float(f) => *f == 0.0,
            Self::Enum(s) | Self::Str(s) => s.is_empty(),
            Self::Array(items) => items.iter().all(Value::is_unset),
            Self::Struct(fields) => fields.values().all(Value::is_unset),
        }
    }

    /// Short name of the variant, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Uint(_) => "uint",
            Self::Float(_) => "float",
            Self::Flags(_) => "flags",
            Self::Enum(_) => "enum",
            Self::Str(_) => "string",
            Self::Array(_) => "array",
            Self::Struct(_) => "struct",
        }
    }
}

fn as_f64(n: Number) -> f64 {
    match n {
        Number::Int(i) => i as f64,
        Number::Float(f) => f,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Uint(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Flags(bits) => write!(f, "{bits:#x}"),
            Self::Enum(s) => f.write_str(s),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Struct(fields) => {
                f.write_str("{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}
