//! The mergeable option map every optimizer is configured with.
//!
//! [`Options`] is a flat, sorted map from key to [`Value`]. Solver-agnostic
//! keys (`maxiter`, `maxfun`) live next to solver-specific ones, and each
//! adapter reads what it understands. Named accessors such as
//! [`Options::maxiter`] are thin aliases over the same map, so setting a value
//! by name or by key is the same operation.

mod value;

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::Persist;

pub use value::Value;

/// Key for the iteration limit shared by every optimizer.
pub const MAXITER: &str = "maxiter";

/// Key for the objective evaluation limit shared by every optimizer.
pub const MAXFUN: &str = "maxfun";

/// A flat key/value option map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options(BTreeMap<String, Value>);

impl Options {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns these options with `key` set to `value`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Sets `key`, returning the value it replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Merges `other` into these options.
    ///
    /// Keys present in `other` replace existing values; all other keys are
    /// left untouched.
    pub fn update(&mut self, other: impl IntoIterator<Item = (String, Value)>) -> &mut Self {
        self.0.extend(other);
        self
    }

    /// Removes `key` and returns its value, if present.
    pub fn pop(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Removes `key` and returns its value, or `default` when it is absent.
    pub fn pop_or(&mut self, key: &str, default: impl Into<Value>) -> Value {
        self.0.remove(key).unwrap_or_else(|| default.into())
    }

    /// Moves the value under `from` to `to`, replacing anything stored there.
    ///
    /// Returns `true` if a value was moved.
    pub fn rename(&mut self, from: &str, to: impl Into<String>) -> bool {
        match self.0.remove(from) {
            Some(value) => {
                self.0.insert(to.into(), value);
                true
            }
            None => false,
        }
    }

    /// Keeps only the entries whose key satisfies `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.0.retain(|key, _| keep(key));
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The iteration limit, if set.
    #[must_use]
    pub fn maxiter(&self) -> Option<usize> {
        self.get(MAXITER).and_then(Value::as_usize)
    }

    pub fn set_maxiter(&mut self, maxiter: usize) -> &mut Self {
        self.insert(MAXITER, maxiter);
        self
    }

    /// The objective evaluation limit, if set.
    #[must_use]
    pub fn maxfun(&self) -> Option<usize> {
        self.get(MAXFUN).and_then(Value::as_usize)
    }

    pub fn set_maxfun(&mut self, maxfun: usize) -> &mut Self {
        self.insert(MAXFUN, maxfun);
        self
    }
}

impl Persist for Options {}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Options {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl IntoIterator for Options {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// One `key: value` line per entry, keys right-aligned.
impl fmt::Display for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.keys().map(str::len).max().unwrap_or(0) + 1;
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{key:>width$}: {value}")?;
        }
        Ok(())
    }
}
