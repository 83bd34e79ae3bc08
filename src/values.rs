// src/values.rs
//
// Closed tagged scalar type for heterogeneous batch values, with the
// classification predicates the metric computers dispatch on.

use serde::{Deserialize, Serialize};

/// Maximum string length before truncation kicks in.
const TRUNCATE_THRESHOLD: usize = 18;
const TRUNCATE_HEAD: usize = 10;
const TRUNCATE_TAIL: usize = 5;

/// A single scalar cell of a batch: integer, float (NaN/Infinity allowed),
/// string, boolean, or missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Missing means null, or a non-finite float. Feature ingestion treats
    /// NaN and ±Infinity as missing.
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(f) => !f.is_finite(),
            _ => false,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Value::Text(_))
    }

    /// Finite numeric equal to its own floor. NaN/Infinity never match.
    pub fn is_integral(&self) -> bool {
        match self {
            Value::Int(_) => true,
            Value::Float(f) => f.is_finite() && f.fract() == 0.0,
            _ => false,
        }
    }

    /// Finite numeric with a fractional part.
    pub fn is_fractional(&self) -> bool {
        match self {
            Value::Float(f) => f.is_finite() && f.fract() != 0.0,
            _ => false,
        }
    }

    /// Numerically equal to zero. Booleans count (`false` is zero).
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Int(i) => *i == 0,
            Value::Float(f) => *f == 0.0,
            Value::Bool(b) => !*b,
            _ => false,
        }
    }

    pub fn is_empty_text(&self) -> bool {
        matches!(self, Value::Text(s) if s.is_empty())
    }

    /// Numeric projection fed to the distribution sketch: numerics as-is
    /// (finite only), booleans as 0/1, everything else skipped.
    pub fn numeric_projection(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) if f.is_finite() => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
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

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// Bound a free-text value before it can influence any cardinality-sensitive
/// structure: strings longer than 18 chars become
/// first 10 chars + `...` + last 5 chars (fixed 18-char result).
pub fn truncate_string(s: &str) -> String {
    let n = s.chars().count();
    if n <= TRUNCATE_THRESHOLD {
        return s.to_string();
    }
    let head: String = s.chars().take(TRUNCATE_HEAD).collect();
    let tail: String = s.chars().skip(n - TRUNCATE_TAIL).collect();
    format!("{}...{}", head, tail)
}

pub fn truncate_strings<S: AsRef<str>>(strings: &[S]) -> Vec<String> {
    strings.iter().map(|s| truncate_string(s.as_ref())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_is_bounded_and_stable() {
        let truncated =
            truncate_strings(&["abc", "1234567890abcdefgh", "1234567890abcdefghi"]);
        assert_eq!(
            truncated,
            vec!["abc", "1234567890abcdefgh", "1234567890...efghi"]
        );
        // Fixed 18-char result regardless of input length.
        let long = "x".repeat(10_000);
        assert_eq!(truncate_string(&long).chars().count(), 18);
    }

    #[test]
    fn nan_and_infinity_are_missing_never_integral() {
        let nan = Value::Float(f64::NAN);
        let inf = Value::Float(f64::INFINITY);
        for v in [&nan, &inf] {
            assert!(v.is_missing());
            assert!(!v.is_integral());
            assert!(!v.is_fractional());
            assert!(!v.is_zero());
            assert!(v.numeric_projection().is_none());
        }
    }

    #[test]
    fn classification_predicates() {
        assert!(Value::Int(0).is_zero());
        assert!(Value::Float(0.0).is_zero());
        assert!(Value::Bool(false).is_zero());
        assert!(Value::Float(2.0).is_integral());
        assert!(Value::Float(2.5).is_fractional());
        assert!(Value::Text(String::new()).is_empty_text());
        assert!(!Value::Null.is_zero());
        assert_eq!(Value::Bool(true).numeric_projection(), Some(1.0));
        assert_eq!(Value::Text("a".into()).numeric_projection(), None);
    }
}
