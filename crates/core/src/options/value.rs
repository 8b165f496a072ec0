use std::fmt;

use serde::{Deserialize, Serialize};

/// A loosely typed option or result value.
///
/// Values are stored exactly as given. The read accessors interpret them
/// leniently, so an integral float reads as an integer and an integer reads
/// as a float, but nothing is rewritten in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<f64>),
    Table(Vec<Vec<f64>>),
}

impl Value {
    /// Returns a short description of the variant, for error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "a boolean",
            Self::Int(_) => "an integer",
            Self::Float(_) => "a number",
            Self::Text(_) => "a string",
            Self::List(_) => "a list of numbers",
            Self::Table(_) => "a table of numbers",
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(b) => Some(b),
            Self::Int(i) => Some(i != 0),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Int(i) => Some(i),
            #[allow(clippy::cast_possible_truncation)]
            Self::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(f as i64),
            _ => None,
        }
    }

    /// Reads a non-negative count. Positive infinity saturates to `usize::MAX`.
    #[must_use]
    pub fn as_usize(&self) -> Option<usize> {
        match *self {
            Self::Float(f) if f == f64::INFINITY => Some(usize::MAX),
            _ => self.as_i64().and_then(|i| usize::try_from(i).ok()),
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Float(f) => Some(f),
            #[allow(clippy::cast_precision_loss)]
            Self::Int(i) => Some(i as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Reads a list of numbers. A scalar reads as a one-element list.
    #[must_use]
    pub fn as_list(&self) -> Option<Vec<f64>> {
        match self {
            Self::List(v) => Some(v.clone()),
            other => other.as_f64().map(|f| vec![f]),
        }
    }

    #[must_use]
    pub fn as_table(&self) -> Option<&[Vec<f64>]> {
        match self {
            Self::Table(rows) => Some(rows),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::List(v) => write!(f, "{v:?}"),
            Self::Table(rows) => write!(f, "{rows:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i.into())
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Self::Int(i.into())
    }
}

impl From<u64> for Value {
    fn from(i: u64) -> Self {
        i64::try_from(i).map_or(Self::Float(f64::INFINITY), Self::Int)
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        i64::try_from(i).map_or(Self::Float(f64::INFINITY), Self::Int)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Self::List(v)
    }
}

impl From<&[f64]> for Value {
    fn from(v: &[f64]) -> Self {
        Self::List(v.to_vec())
    }
}

impl<const N: usize> From<[f64; N]> for Value {
    fn from(v: [f64; N]) -> Self {
        Self::List(v.to_vec())
    }
}

impl From<Vec<Vec<f64>>> for Value {
    fn from(rows: Vec<Vec<f64>>) -> Self {
        Self::Table(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_leniently_without_rewriting() {
        let v = Value::Float(3.0);
        assert_eq!(v.as_usize(), Some(3));
        assert_eq!(v, Value::Float(3.0));

        assert_eq!(Value::Int(2).as_f64(), Some(2.0));
        assert_eq!(Value::Float(2.5).as_i64(), None);
        assert_eq!(Value::Int(-1).as_usize(), None);
        assert_eq!(Value::Float(f64::INFINITY).as_usize(), Some(usize::MAX));
        assert_eq!(Value::Float(0.5).as_list(), Some(vec![0.5]));
        assert_eq!(Value::from("x").as_f64(), None);
    }

    #[test]
    fn untagged_json_picks_the_narrowest_variant() {
        let parsed: Vec<Value> =
            serde_json::from_str(r#"[true, 3, 3.5, "a", [1, 2], [[1, 2], [3, 4]]]"#).unwrap();

        assert_eq!(
            parsed,
            vec![
                Value::Bool(true),
                Value::Int(3),
                Value::Float(3.5),
                Value::from("a"),
                Value::List(vec![1.0, 2.0]),
                Value::Table(vec![vec![1.0, 2.0], vec![3.0, 4.0]]),
            ]
        );
    }
}
