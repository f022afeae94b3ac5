//! # Limit-Type Algebra
//!
//! Every capability member carries a [`LimitType`] that fixes what it means
//! for a reported value to satisfy a declared one, how two declarations of
//! the same member combine, and when simulating a declared value on a real
//! target is implausible.
//!
//! ## Rules
//!
//! | Base | `compare(actual, declared)` | `merge(a, b)` |
//! |------|-----------------------------|---------------|
//! | `exact`, `noauto` | `actual == declared` | `a` if `a == b`, else conflict |
//! | `max`, `bits` | `actual >= declared` | `max(a, b)` |
//! | `min` | `actual <= declared` | `min(a, b)` |
//! | `bitmask` | `actual & declared == declared` | `a \| b` |
//! | `range` | `[lo, hi]` containment; equality for scalars | widest `[lo, hi]` |
//!
//! Modifiers: `pot` additionally requires `actual` to be a power of two;
//! `mul` additionally requires `declared % actual == 0` and merges through
//! the greatest common divisor, which is the smallest value implying both.
//!
//! `override_value` substitutes the declared value and warns when the real
//! target would not satisfy it, so a warn-free override is one the hardware
//! backs. `exact` and `range` are stricter: any substitution that changes
//! the reported value warns, a narrower range included.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;
use crate::value::Value;

// ---------------------------------------------------------------------------
// LimitType
// ---------------------------------------------------------------------------

/// Base comparison semantics of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitBase {
    /// Must match exactly.
    Exact,
    /// Capacity: more is better.
    Max,
    /// Bound: tighter (smaller) is better.
    Min,
    /// Bit count: more is better.
    Bits,
    /// Bit containment.
    Bitmask,
    /// Range containment.
    Range,
    /// Exact, and excluded from generated checks.
    NoAuto,
}

impl LimitBase {
    /// Lowercase name as written in registry schemas.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Max => "max",
            Self::Min => "min",
            Self::Bits => "bits",
            Self::Bitmask => "bitmask",
            Self::Range => "range",
            Self::NoAuto => "noauto",
        }
    }
}

/// A member's limit type: a base plus optional `pot`/`mul` modifiers.
///
/// Parsed from the comma-separated registry notation, e.g. `"max,pot"` or
/// `"min,mul"`. A bare `pot` means `max,pot`; a bare `mul` means `min,mul`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LimitType {
    base: LimitBase,
    pot: bool,
    mul: bool,
}

impl LimitType {
    pub const EXACT: Self = Self::new(LimitBase::Exact);
    pub const MAX: Self = Self::new(LimitBase::Max);
    pub const MIN: Self = Self::new(LimitBase::Min);
    pub const BITS: Self = Self::new(LimitBase::Bits);
    pub const BITMASK: Self = Self::new(LimitBase::Bitmask);
    pub const RANGE: Self = Self::new(LimitBase::Range);
    pub const NOAUTO: Self = Self::new(LimitBase::NoAuto);

    /// A limit type without modifiers.
    pub const fn new(base: LimitBase) -> Self {
        Self {
            base,
            pot: false,
            mul: false,
        }
    }

    /// Add the power-of-two modifier. Only `max` and `min` accept it.
    pub fn with_pot(self) -> Result<Self, ValueError> {
        match self.base {
            LimitBase::Max | LimitBase::Min => Ok(Self { pot: true, ..self }),
            other => Err(ValueError::InvalidLimitType {
                input: format!("{},pot", other.as_str()),
                reason: "pot combines only with max or min".into(),
            }),
        }
    }

    /// Add the multiple-of modifier. Only `min` accepts it.
    pub fn with_mul(self) -> Result<Self, ValueError> {
        match self.base {
            LimitBase::Min => Ok(Self { mul: true, ..self }),
            other => Err(ValueError::InvalidLimitType {
                input: format!("{},mul", other.as_str()),
                reason: "mul combines only with min".into(),
            }),
        }
    }

    pub fn base(self) -> LimitBase {
        self.base
    }

    pub fn is_pot(self) -> bool {
        self.pot
    }

    pub fn is_mul(self) -> bool {
        self.mul
    }
}

impl Default for LimitType {
    fn default() -> Self {
        Self::EXACT
    }
}

impl fmt::Display for LimitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base.as_str())?;
        if self.pot {
            f.write_str(",pot")?;
        }
        if self.mul {
            f.write_str(",mul")?;
        }
        Ok(())
    }
}

impl FromStr for LimitType {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut base = None;
        let mut pot = false;
        let mut mul = false;
        for part in s.split(',').map(str::trim) {
            let parsed = match part {
                "exact" => LimitBase::Exact,
                "max" => LimitBase::Max,
                "min" => LimitBase::Min,
                "bits" => LimitBase::Bits,
                "bitmask" => LimitBase::Bitmask,
                "range" => LimitBase::Range,
                "noauto" => LimitBase::NoAuto,
                "pot" => {
                    pot = true;
                    continue;
                }
                "mul" => {
                    mul = true;
                    continue;
                }
                other => {
                    return Err(ValueError::InvalidLimitType {
                        input: s.to_string(),
                        reason: format!("unknown limit type {other:?}"),
                    })
                }
            };
            if base.replace(parsed).is_some() {
                return Err(ValueError::InvalidLimitType {
                    input: s.to_string(),
                    reason: "more than one base limit type".into(),
                });
            }
        }

        let base = match (base, pot, mul) {
            (Some(b), _, _) => b,
            (None, _, true) => LimitBase::Min,
            (None, true, false) => LimitBase::Max,
            (None, false, false) => {
                return Err(ValueError::InvalidLimitType {
                    input: s.to_string(),
                    reason: "empty limit type".into(),
                })
            }
        };
        let mut limit = LimitType::new(base);
        if pot {
            limit = limit.with_pot()?;
        }
        if mul {
            limit = limit.with_mul()?;
        }
        Ok(limit)
    }
}

impl TryFrom<String> for LimitType {
    type Error = ValueError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<LimitType> for String {
    fn from(l: LimitType) -> Self {
        l.to_string()
    }
}

// ---------------------------------------------------------------------------
// Compare
// ---------------------------------------------------------------------------

/// Does `actual` satisfy `declared` under `limit`?
///
/// Arrays outside `range` compare element-wise: every declared element must
/// be matched by the reported element at the same index.
pub fn compare(actual: &Value, declared: &Value, limit: LimitType) -> bool {
    if let (Value::Array(a), Value::Array(d), false) =
        (actual, declared, limit.base == LimitBase::Range)
    {
        return d.len() <= a.len() && a.iter().zip(d).all(|(x, y)| compare(x, y, limit));
    }

    let base_ok = match limit.base {
        LimitBase::Exact | LimitBase::NoAuto => actual.same_as(declared),
        LimitBase::Max | LimitBase::Bits => matches!(
            actual.cmp_numeric(declared),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        LimitBase::Min => matches!(
            actual.cmp_numeric(declared),
            Some(Ordering::Less | Ordering::Equal)
        ),
        LimitBase::Bitmask => match (actual.as_bits(), declared.as_bits()) {
            (Some(a), Some(d)) => a & d == d,
            _ => false,
        },
        LimitBase::Range => range_contains(actual, declared),
    };

    base_ok && (!limit.pot || is_power_of_two(actual)) && (!limit.mul || divides(actual, declared))
}

fn range_contains(actual: &Value, declared: &Value) -> bool {
    match (actual, declared) {
        (Value::Array(a), Value::Array(d)) if a.len() == 2 && d.len() == 2 => {
            matches!(
                a[0].cmp_numeric(&d[0]),
                Some(Ordering::Less | Ordering::Equal)
            ) && matches!(
                a[1].cmp_numeric(&d[1]),
                Some(Ordering::Greater | Ordering::Equal)
            )
        }
        _ => actual.same_as(declared),
    }
}

fn is_power_of_two(v: &Value) -> bool {
    v.as_integer()
        .and_then(|n| u128::try_from(n).ok())
        .is_some_and(u128::is_power_of_two)
}

fn divides(actual: &Value, declared: &Value) -> bool {
    match (actual.as_integer(), declared.as_integer()) {
        (Some(a), Some(d)) if a != 0 => d % a == 0,
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Two declarations of one member that no single value implies.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeConflict {
    /// The value already accumulated (reported as canonical).
    pub first: Value,
    /// The value that could not be folded in.
    pub second: Value,
}

impl fmt::Display for MergeConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} conflicts with {}", self.first, self.second)
    }
}

/// Combine two declared constraints into one that implies both.
pub fn merge(a: &Value, b: &Value, limit: LimitType) -> Result<Value, MergeConflict> {
    let conflict = || MergeConflict {
        first: a.clone(),
        second: b.clone(),
    };

    if limit.base == LimitBase::Range {
        return merge_range(a, b).ok_or_else(conflict);
    }
    if let (Value::Array(xs), Value::Array(ys)) = (a, b) {
        let mut out = Vec::with_capacity(xs.len().max(ys.len()));
        for (x, y) in xs.iter().zip(ys) {
            out.push(merge(x, y, limit).map_err(|_| conflict())?);
        }
        let longer = if xs.len() >= ys.len() { xs } else { ys };
        out.extend(longer.iter().skip(out.len()).cloned());
        return Ok(Value::Array(out));
    }

    if limit.mul {
        return match (a.as_integer(), b.as_integer()) {
            (Some(x), Some(y)) => Ok(rebuild_integer(a, gcd(x, y))),
            _ => Err(conflict()),
        };
    }

    match limit.base {
        LimitBase::Exact | LimitBase::NoAuto => {
            if a.same_as(b) {
                Ok(a.clone())
            } else {
                Err(conflict())
            }
        }
        LimitBase::Max | LimitBase::Bits => match a.cmp_numeric(b) {
            Some(Ordering::Less) => Ok(b.clone()),
            Some(_) => Ok(a.clone()),
            None => Err(conflict()),
        },
        LimitBase::Min => match a.cmp_numeric(b) {
            Some(Ordering::Greater) => Ok(b.clone()),
            Some(_) => Ok(a.clone()),
            None => Err(conflict()),
        },
        LimitBase::Bitmask => match (a, a.as_bits(), b.as_bits()) {
            (Value::Uint(_), Some(x), Some(y)) => Ok(Value::Uint(x | y)),
            (_, Some(x), Some(y)) => Ok(Value::Flags(x | y)),
            _ => Err(conflict()),
        },
        LimitBase::Range => Err(conflict()),
    }
}

fn merge_range(a: &Value, b: &Value) -> Option<Value> {
    match (a, b) {
        (Value::Array(xs), Value::Array(ys)) if xs.len() == 2 && ys.len() == 2 => {
            let lo = match xs[0].cmp_numeric(&ys[0])? {
                Ordering::Greater => ys[0].clone(),
                _ => xs[0].clone(),
            };
            let hi = match xs[1].cmp_numeric(&ys[1])? {
                Ordering::Less => ys[1].clone(),
                _ => xs[1].clone(),
            };
            Some(Value::Array(vec![lo, hi]))
        }
        _ if a.same_as(b) => Some(a.clone()),
        _ => None,
    }
}

fn gcd(a: i128, b: i128) -> i128 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn rebuild_integer(template: &Value, n: i128) -> Value {
    match template {
        Value::Int(_) => i64::try_from(n).map(Value::Int).unwrap_or(Value::Int(i64::MAX)),
        _ => u64::try_from(n).map(Value::Uint).unwrap_or(Value::Uint(u64::MAX)),
    }
}

// ---------------------------------------------------------------------------
// Override
// ---------------------------------------------------------------------------

/// Result of substituting a declared value for a reported one.
#[derive(Debug, Clone, PartialEq)]
pub struct Overridden {
    /// The value the simulated target reports.
    pub value: Value,
    /// The real target does not back the substituted value.
    pub warn: bool,
}

/// Replace `actual` with `declared`, flagging implausible substitutions.
///
/// `max`/`bits` warn when `declared > actual`, `min` when
/// `declared < actual`, `bitmask` when `declared` carries bits absent from
/// `actual`, and `exact`/`noauto`/`range` whenever the values differ. The
/// `pot`/`mul` modifiers warn when `actual` does not satisfy them. A member
/// that is not modifiable keeps `actual`.
pub fn override_value(
    actual: &Value,
    declared: &Value,
    limit: LimitType,
    modifiable: bool,
) -> Overridden {
    let warn = match limit.base {
        LimitBase::Exact | LimitBase::NoAuto | LimitBase::Range => !actual.same_as(declared),
        _ => !compare(actual, declared, limit),
    };
    let value = if modifiable {
        declared.clone()
    } else {
        actual.clone()
    };
    Overridden { value, warn }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lt(s: &str) -> LimitType {
        s.parse().unwrap()
    }

    #[test]
    fn parse_and_display() {
        assert_eq!(lt("max"), LimitType::MAX);
        assert_eq!(lt("max,pot").to_string(), "max,pot");
        assert_eq!(lt("min, mul").to_string(), "min,mul");
        assert_eq!(lt("pot").to_string(), "max,pot");
        assert_eq!(lt("mul").to_string(), "min,mul");
        assert!("max,mul".parse::<LimitType>().is_err());
        assert!("bitmask,pot".parse::<LimitType>().is_err());
        assert!("max,min".parse::<LimitType>().is_err());
        assert!("bogus".parse::<LimitType>().is_err());
        assert!("".parse::<LimitType>().is_err());
    }

    #[test]
    fn serde_uses_registry_notation() {
        let json = serde_json::to_string(&lt("min,pot")).unwrap();
        assert_eq!(json, "\"min,pot\"");
        let back: LimitType = serde_json::from_str("\"min,mul\"").unwrap();
        assert!(back.is_mul());
        assert!(serde_json::from_str::<LimitType>("\"sideways\"").is_err());
    }

    #[test]
    fn compare_max_and_bits() {
        assert!(compare(&Value::Uint(16), &Value::Uint(8), LimitType::MAX));
        assert!(compare(&Value::Uint(8), &Value::Uint(8), LimitType::BITS));
        assert!(!compare(&Value::Uint(4), &Value::Uint(8), LimitType::MAX));
        assert!(compare(&Value::Bool(true), &Value::Bool(true), LimitType::MAX));
        assert!(compare(&Value::Bool(true), &Value::Bool(false), LimitType::MAX));
        assert!(!compare(&Value::Bool(false), &Value::Bool(true), LimitType::MAX));
    }

    #[test]
    fn compare_min() {
        assert!(compare(&Value::Uint(128), &Value::Uint(256), LimitType::MIN));
        assert!(!compare(&Value::Uint(512), &Value::Uint(256), LimitType::MIN));
    }

    #[test]
    fn compare_exact_and_noauto() {
        assert!(compare(&Value::Enum("A".into()), &Value::Enum("A".into()), LimitType::EXACT));
        assert!(!compare(&Value::Enum("A".into()), &Value::Enum("B".into()), LimitType::NOAUTO));
        assert!(!compare(&Value::Uint(3), &Value::Uint(4), LimitType::EXACT));
    }

    #[test]
    fn compare_bitmask() {
        assert!(compare(&Value::Flags(0b111), &Value::Flags(0b101), LimitType::BITMASK));
        assert!(!compare(&Value::Flags(0b011), &Value::Flags(0b101), LimitType::BITMASK));
        assert!(!compare(&Value::Str("x".into()), &Value::Flags(1), LimitType::BITMASK));
    }

    #[test]
    fn compare_pot_and_mul() {
        assert!(compare(&Value::Uint(64), &Value::Uint(256), lt("min,pot")));
        assert!(!compare(&Value::Uint(48), &Value::Uint(256), lt("min,pot")));
        assert!(compare(&Value::Uint(64), &Value::Uint(256), lt("min,mul")));
        assert!(!compare(&Value::Uint(96), &Value::Uint(256), lt("min,mul")));
        assert!(!compare(&Value::Uint(0), &Value::Uint(256), lt("min,mul")));
    }

    #[test]
    fn compare_range() {
        let range = |a: f64, b: f64| Value::Array(vec![Value::Float(a), Value::Float(b)]);
        assert!(compare(&range(1.0, 64.0), &range(1.0, 16.0), LimitType::RANGE));
        assert!(!compare(&range(2.0, 64.0), &range(1.0, 16.0), LimitType::RANGE));
        assert!(!compare(&range(1.0, 8.0), &range(1.0, 16.0), LimitType::RANGE));
        // scalar range degenerates to equality
        assert!(compare(&Value::Uint(3), &Value::Uint(3), LimitType::RANGE));
        assert!(!compare(&Value::Uint(4), &Value::Uint(3), LimitType::RANGE));
    }

    #[test]
    fn compare_arrays_elementwise() {
        let a = Value::Array(vec![Value::Uint(1024), Value::Uint(1024), Value::Uint(64)]);
        let d = Value::Array(vec![Value::Uint(256), Value::Uint(256), Value::Uint(64)]);
        assert!(compare(&a, &d, LimitType::MAX));
        let short = Value::Array(vec![Value::Uint(1024)]);
        assert!(!compare(&short, &d, LimitType::MAX));
    }

    #[test]
    fn merge_rules() {
        assert_eq!(
            merge(&Value::Uint(8), &Value::Uint(16), LimitType::MAX).unwrap(),
            Value::Uint(16)
        );
        assert_eq!(
            merge(&Value::Uint(8), &Value::Uint(16), LimitType::MIN).unwrap(),
            Value::Uint(8)
        );
        assert_eq!(
            merge(&Value::Flags(1), &Value::Flags(4), LimitType::BITMASK).unwrap(),
            Value::Flags(5)
        );
        assert_eq!(
            merge(&Value::Uint(3), &Value::Uint(3), LimitType::EXACT).unwrap(),
            Value::Uint(3)
        );
        let err = merge(&Value::Uint(3), &Value::Uint(4), LimitType::EXACT).unwrap_err();
        assert_eq!(err.first, Value::Uint(3));
        assert_eq!(err.second, Value::Uint(4));
    }

    #[test]
    fn merge_mul_uses_gcd() {
        assert_eq!(
            merge(&Value::Uint(48), &Value::Uint(64), lt("min,mul")).unwrap(),
            Value::Uint(16)
        );
        assert_eq!(
            merge(&Value::Uint(64), &Value::Uint(256), lt("min,mul")).unwrap(),
            Value::Uint(64)
        );
    }

    #[test]
    fn merge_range_widens() {
        let range = |a: u64, b: u64| Value::Array(vec![Value::Uint(a), Value::Uint(b)]);
        assert_eq!(
            merge(&range(2, 8), &range(1, 4), LimitType::RANGE).unwrap(),
            range(1, 8)
        );
    }

    #[test]
    fn merge_incomparable_is_conflict() {
        assert!(merge(&Value::Str("a".into()), &Value::Uint(1), LimitType::MAX).is_err());
    }

    #[test]
    fn override_warnings() {
        let o = override_value(&Value::Uint(8), &Value::Uint(16), LimitType::MAX, true);
        assert_eq!(o.value, Value::Uint(16));
        assert!(o.warn);
        let o = override_value(&Value::Uint(128), &Value::Uint(256), LimitType::MIN, true);
        assert_eq!(o.value, Value::Uint(256));
        assert!(!o.warn);
        let o = override_value(&Value::Flags(0b01), &Value::Flags(0b11), LimitType::BITMASK, true);
        assert!(o.warn);
        let o = override_value(&Value::Uint(1), &Value::Uint(2), LimitType::EXACT, false);
        assert_eq!(o.value, Value::Uint(1));
        assert!(o.warn);
    }

    #[test]
    fn narrowing_a_range_warns() {
        let range = |a: f64, b: f64| Value::Array(vec![Value::Float(a), Value::Float(b)]);
        let o = override_value(&range(1.0, 64.0), &range(1.0, 16.0), LimitType::RANGE, true);
        assert_eq!(o.value, range(1.0, 16.0));
        assert!(o.warn);
        let o = override_value(&range(1.0, 64.0), &range(1.0, 64.0), LimitType::RANGE, true);
        assert!(!o.warn);
    }
}
