use std::time::Duration;

use curvefit_core::{Options, Value};
use thiserror::Error;

/// Option keys the evolution strategy understands.
///
/// Any other key is rejected by [`Config::from_options`]. Callers holding a
/// mixed option map should filter it with [`accepts`] first.
pub const OPTION_KEYS: &[&str] = &[
    "CMA_stds",
    "bounds",
    "ftarget",
    "maxfevals",
    "maxiter",
    "popsize",
    "seed",
    "timeout",
    "tolconditioncov",
    "tolflatfitness",
    "tolfun",
    "tolfunhist",
    "tolstagnation",
    "tolupsigma",
    "tolx",
    "verb_disp",
    "verbose",
];

/// Whether `key` is a valid evolution strategy option.
#[must_use]
pub fn accepts(key: &str) -> bool {
    OPTION_KEYS.contains(&key)
}

/// Configuration for the evolution strategy.
///
/// Settings that depend on the problem dimension (`popsize`, `maxiter`,
/// `tolstagnation`) default to `None` and are resolved when the strategy is
/// created.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    popsize: Option<usize>,
    seed: Option<u64>,
    stds: Option<Vec<f64>>,
    bounds: Option<(Vec<f64>, Vec<f64>)>,
    ftarget: f64,
    maxfevals: usize,
    maxiter: Option<usize>,
    timeout: Option<Duration>,
    tolfun: f64,
    tolfunhist: f64,
    tolx: f64,
    tolupsigma: f64,
    tolconditioncov: f64,
    tolstagnation: Option<usize>,
    tolflatfitness: usize,
    verb_disp: usize,
    verbose: i64,
}

/// Errors that can occur when building an evolution strategy config.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("unknown option `{0}`")]
    UnknownOption(String),

    #[error("option `{key}` must be {expected}")]
    InvalidValue { key: String, expected: &'static str },

    #[error("`{0}` must be finite and non-negative")]
    Tolerance(&'static str),

    #[error("popsize must be at least 2")]
    PopulationSize,

    #[error("bounds must be [lower, upper] with lower <= upper")]
    Bounds,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            popsize: None,
            seed: None,
            stds: None,
            bounds: None,
            ftarget: f64::NEG_INFINITY,
            maxfevals: usize::MAX,
            maxiter: None,
            timeout: None,
            tolfun: 1e-11,
            tolfunhist: 1e-12,
            tolx: 1e-11,
            tolupsigma: 1e20,
            tolconditioncov: 1e14,
            tolstagnation: None,
            tolflatfitness: 1,
            verb_disp: 100,
            verbose: 3,
        }
    }
}

impl Config {
    /// Builds a config from an option map.
    ///
    /// `bounds` is `[lowers, uppers]`, where each side is either one value per
    /// dimension or a single value applied to every dimension. A `seed` of zero
    /// means "seed from entropy".
    ///
    /// # Errors
    ///
    /// Returns an error for keys outside [`OPTION_KEYS`], for values of the
    /// wrong shape, and for invalid tolerances, population sizes, or bounds.
    pub fn from_options(options: &Options) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for (key, value) in options.iter() {
            match key {
                "CMA_stds" => config.stds = Some(list(key, value)?),
                "bounds" => config = config.with_bounds(bounds(value)?)?,
                "ftarget" => config.ftarget = float(key, value)?,
                "maxfevals" => config.maxfevals = count(key, value)?,
                "maxiter" => config.maxiter = Some(count(key, value)?),
                "popsize" => config = config.with_popsize(count(key, value)?)?,
                "seed" => {
                    let seed = value
                        .as_i64()
                        .and_then(|s| u64::try_from(s).ok())
                        .ok_or_else(|| invalid(key, "a non-negative integer"))?;
                    config.seed = (seed != 0).then_some(seed);
                }
                "timeout" => {
                    let seconds = non_negative(key, float(key, value)?)?;
                    config.timeout = seconds.is_finite().then(|| Duration::from_secs_f64(seconds));
                }
                "tolconditioncov" => config.tolconditioncov = non_negative(key, float(key, value)?)?,
                "tolflatfitness" => config.tolflatfitness = count(key, value)?,
                "tolfun" => config.tolfun = tolerance("tolfun", float(key, value)?)?,
                "tolfunhist" => config.tolfunhist = tolerance("tolfunhist", float(key, value)?)?,
                "tolstagnation" => config.tolstagnation = Some(count(key, value)?),
                "tolupsigma" => config.tolupsigma = non_negative(key, float(key, value)?)?,
                "tolx" => config.tolx = tolerance("tolx", float(key, value)?)?,
                "verb_disp" => config.verb_disp = count(key, value)?,
                "verbose" => {
                    config.verbose = value.as_i64().ok_or_else(|| invalid(key, "an integer"))?;
                }
                other => return Err(ConfigError::UnknownOption(other.to_owned())),
            }
        }

        Ok(config)
    }

    /// Returns this config with a fixed population size.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::PopulationSize`] if `popsize < 2`.
    pub fn with_popsize(mut self, popsize: usize) -> Result<Self, ConfigError> {
        if popsize < 2 {
            return Err(ConfigError::PopulationSize);
        }
        self.popsize = Some(popsize);
        Ok(self)
    }

    /// Returns this config with box bounds, as `(lowers, uppers)`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Bounds`] if the sides differ in length or any
    /// lower bound exceeds its upper bound.
    pub fn with_bounds(mut self, (lower, upper): (Vec<f64>, Vec<f64>)) -> Result<Self, ConfigError> {
        let paired = lower.len() == upper.len() || lower.len() == 1 || upper.len() == 1;
        let ordered = lower
            .iter()
            .cycle()
            .zip(upper.iter().cycle())
            .take(lower.len().max(upper.len()))
            .all(|(lo, hi)| lo <= hi);
        if !paired || !ordered || lower.is_empty() || upper.is_empty() {
            return Err(ConfigError::Bounds);
        }
        self.bounds = Some((lower, upper));
        Ok(self)
    }

    /// Returns this config with a fixed random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Returns this config with per-dimension initial spreads.
    #[must_use]
    pub fn with_stds(mut self, stds: Vec<f64>) -> Self {
        self.stds = Some(stds);
        self
    }

    /// Returns this config with an evaluation limit.
    #[must_use]
    pub fn with_maxfevals(mut self, maxfevals: usize) -> Self {
        self.maxfevals = maxfevals;
        self
    }

    /// Returns this config with a target objective value.
    #[must_use]
    pub fn with_ftarget(mut self, ftarget: f64) -> Self {
        self.ftarget = ftarget;
        self
    }

    /// Returns this config with progress logging every `verb_disp` iterations.
    #[must_use]
    pub fn with_verb_disp(mut self, verb_disp: usize) -> Self {
        self.verb_disp = verb_disp;
        self
    }

    #[must_use]
    pub fn popsize(&self) -> Option<usize> {
        self.popsize
    }

    #[must_use]
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    #[must_use]
    pub fn stds(&self) -> Option<&[f64]> {
        self.stds.as_deref()
    }

    /// Bounds as `(lowers, uppers)`; either side may hold a single value.
    #[must_use]
    pub fn bounds(&self) -> Option<(&[f64], &[f64])> {
        self.bounds
            .as_ref()
            .map(|(lower, upper)| (lower.as_slice(), upper.as_slice()))
    }

    #[must_use]
    pub fn ftarget(&self) -> f64 {
        self.ftarget
    }

    #[must_use]
    pub fn maxfevals(&self) -> usize {
        self.maxfevals
    }

    #[must_use]
    pub fn maxiter(&self) -> Option<usize> {
        self.maxiter
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    #[must_use]
    pub fn tolfun(&self) -> f64 {
        self.tolfun
    }

    #[must_use]
    pub fn tolfunhist(&self) -> f64 {
        self.tolfunhist
    }

    #[must_use]
    pub fn tolx(&self) -> f64 {
        self.tolx
    }

    #[must_use]
    pub fn tolupsigma(&self) -> f64 {
        self.tolupsigma
    }

    #[must_use]
    pub fn tolconditioncov(&self) -> f64 {
        self.tolconditioncov
    }

    #[must_use]
    pub fn tolstagnation(&self) -> Option<usize> {
        self.tolstagnation
    }

    #[must_use]
    pub fn tolflatfitness(&self) -> usize {
        self.tolflatfitness
    }

    #[must_use]
    pub fn verb_disp(&self) -> usize {
        self.verb_disp
    }

    #[must_use]
    pub fn verbose(&self) -> i64 {
        self.verbose
    }
}

fn invalid(key: &str, expected: &'static str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_owned(),
        expected,
    }
}

fn float(key: &str, value: &Value) -> Result<f64, ConfigError> {
    value.as_f64().ok_or_else(|| invalid(key, "a number"))
}

fn count(key: &str, value: &Value) -> Result<usize, ConfigError> {
    value
        .as_usize()
        .ok_or_else(|| invalid(key, "a non-negative integer"))
}

fn list(key: &str, value: &Value) -> Result<Vec<f64>, ConfigError> {
    value.as_list().ok_or_else(|| invalid(key, "a list of numbers"))
}

fn non_negative(key: &str, value: f64) -> Result<f64, ConfigError> {
    if value.is_nan() || value < 0.0 {
        return Err(invalid(key, "non-negative"));
    }
    Ok(value)
}

fn tolerance(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::Tolerance(name));
    }
    Ok(value)
}

fn bounds(value: &Value) -> Result<(Vec<f64>, Vec<f64>), ConfigError> {
    match value {
        Value::Table(rows) if rows.len() == 2 => Ok((rows[0].clone(), rows[1].clone())),
        Value::List(pair) if pair.len() == 2 => Ok((vec![pair[0]], vec![pair[1]])),
        _ => Err(ConfigError::Bounds),
    }
}
