use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Persist, Value};

/// Name to value, as in `parameters`.
pub type NamedValues = BTreeMap<String, f64>;

/// The normalized outcome of one optimization run.
///
/// Every optimizer fills the base fields. Evolution strategies add `sigma`,
/// `evals_best`, and `stop`; local searches add `success` through `maxcv`.
/// The fit driver then attaches `duration`, `optimize_keys`, and
/// `parameters`.
///
/// Fields are public for direct access. [`OptimizeResult::get`] and
/// [`OptimizeResult::update`] reach the same fields by their serialized key,
/// and keep any unrecognized key in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeResult {
    /// Solution vector.
    pub x: Vec<f64>,

    /// Per-parameter spread at the solution, where the backend reports one.
    pub stds: Vec<f64>,

    /// Objective value at `x`.
    pub fun: f64,

    /// Objective evaluations.
    pub nfev: usize,

    /// Iterations.
    pub nit: usize,

    /// Wall-clock seconds spent in the run.
    pub duration: f64,

    /// Parameter names in the order of `x`.
    #[serde(rename = "optimizeKeys")]
    pub optimize_keys: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sigma: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub evals_best: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub jac: Option<Vec<f64>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hess: Option<Vec<Vec<f64>>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub njev: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub nhev: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxcv: Option<f64>,

    /// Named solution values, keyed by parameter name.
    pub parameters: NamedValues,

    /// Per-objective fitness values, for callers that fit several targets.
    pub fitness: BTreeMap<String, NamedValues>,

    /// Per-objective weights, matching `fitness`.
    pub weights: BTreeMap<String, NamedValues>,

    /// Termination criteria that fired, mapped to their thresholds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<NamedValues>,

    /// Keys with no dedicated field.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl Persist for OptimizeResult {}

impl OptimizeResult {
    /// Reads a scalar or vector field by its serialized key.
    ///
    /// Map-valued fields (`parameters`, `optimizeKeys`, `fitness`, `weights`,
    /// `stop`) are reached through their public fields instead.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        let value = match key {
            "x" => self.x.clone().into(),
            "stds" => self.stds.clone().into(),
            "fun" => self.fun.into(),
            "nfev" => self.nfev.into(),
            "nit" => self.nit.into(),
            "duration" => self.duration.into(),
            "sigma" => self.sigma?.into(),
            "evals_best" => self.evals_best?.into(),
            "success" => self.success?.into(),
            "status" => self.status?.into(),
            "message" => self.message.clone()?.into(),
            "jac" => self.jac.clone()?.into(),
            "hess" => self.hess.clone()?.into(),
            "njev" => self.njev?.into(),
            "nhev" => self.nhev?.into(),
            "maxcv" => self.maxcv?.into(),
            _ => return self.extra.get(key).cloned(),
        };
        Some(value)
    }

    /// Sets a field by its serialized key.
    ///
    /// Unknown keys are stored in `extra`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidField`] if the value has the wrong shape for the
    /// field, or if the key names a map-valued field.
    pub fn update(&mut self, key: &str, value: impl Into<Value>) -> Result<&mut Self, Error> {
        let value = value.into();
        let invalid = || Error::InvalidField {
            key: key.to_owned(),
        };

        match key {
            "x" => self.x = value.as_list().ok_or_else(invalid)?,
            "stds" => self.stds = value.as_list().ok_or_else(invalid)?,
            "fun" => self.fun = value.as_f64().ok_or_else(invalid)?,
            "nfev" => self.nfev = value.as_usize().ok_or_else(invalid)?,
            "nit" => self.nit = value.as_usize().ok_or_else(invalid)?,
            "duration" => self.duration = value.as_f64().ok_or_else(invalid)?,
            "sigma" => self.sigma = Some(value.as_f64().ok_or_else(invalid)?),
            "evals_best" => self.evals_best = Some(value.as_usize().ok_or_else(invalid)?),
            "success" => self.success = Some(value.as_bool().ok_or_else(invalid)?),
            "status" => self.status = Some(value.as_i64().ok_or_else(invalid)?),
            "message" => self.message = Some(value.as_str().ok_or_else(invalid)?.to_owned()),
            "jac" => self.jac = Some(value.as_list().ok_or_else(invalid)?),
            "hess" => self.hess = Some(value.as_table().ok_or_else(invalid)?.to_vec()),
            "njev" => self.njev = Some(value.as_usize().ok_or_else(invalid)?),
            "nhev" => self.nhev = Some(value.as_usize().ok_or_else(invalid)?),
            "maxcv" => self.maxcv = Some(value.as_f64().ok_or_else(invalid)?),
            "parameters" | "optimizeKeys" | "fitness" | "weights" | "stop" | "extra" => {
                return Err(invalid());
            }
            _ => {
                self.extra.insert(key.to_owned(), value);
            }
        }
        Ok(self)
    }

    /// A stable 64-bit FNV-1a hash of the JSON encoding.
    ///
    /// Equal results always hash equally, so the value can key a store of
    /// previous runs.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const PRIME: u64 = 0x0100_0000_01b3;

        // Struct and map keys serialize in a fixed order, so the text is canonical.
        let text = serde_json::to_string(self).unwrap_or_default();
        text.bytes()
            .fold(OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(PRIME))
    }
}
