use curvefit_core::{Options, Value};

use super::{Error, Method};

/// Run settings resolved from an option map for one method.
///
/// Every limit and tolerance has a concrete value here. Defaults follow the
/// conventional values for each method, some of which scale with the problem
/// dimension.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct Settings {
    pub(super) maxiter: usize,
    pub(super) budget: usize,
    pub(super) ftol: f64,
    pub(super) gtol: f64,
    pub(super) xtol: f64,
    pub(super) fatol: f64,
    pub(super) eps: f64,
    pub(super) relative_step: Option<f64>,
    pub(super) maxcor: usize,
    pub(super) adaptive: bool,
    pub(super) initial_simplex: Option<Vec<Vec<f64>>>,
    pub(super) direc: Option<Vec<Vec<f64>>>,
    pub(super) disp: bool,
}

impl Settings {
    fn defaults(method: Method, dim: usize) -> Self {
        let base = Self {
            maxiter: usize::MAX,
            budget: usize::MAX,
            ftol: 0.0,
            gtol: 1e-5,
            xtol: 1e-4,
            fatol: 1e-4,
            eps: 1e-8,
            relative_step: None,
            maxcor: 10,
            adaptive: false,
            initial_simplex: None,
            direc: None,
            disp: false,
        };
        match method {
            Method::LBfgsB => Self {
                maxiter: 15_000,
                budget: 15_000,
                ftol: 2.220_446_049_250_313e-9,
                ..base
            },
            Method::NelderMead => Self {
                maxiter: 200 * dim,
                budget: 200 * dim,
                ..base
            },
            Method::Powell => Self {
                maxiter: 1000 * dim,
                budget: 1000 * dim,
                ftol: 1e-4,
                ..base
            },
            Method::Tnc => Self {
                budget: (10 * dim).max(100),
                xtol: f64::EPSILON.sqrt(),
                ..base
            },
        }
    }

    /// Resolves settings for `method` on a problem of dimension `dim`.
    ///
    /// Keys `method` does not read are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] if a recognized key holds a value of
    /// the wrong shape.
    pub(super) fn new(method: Method, dim: usize, options: &Options) -> Result<Self, Error> {
        let mut settings = Self::defaults(method, dim);

        for (key, value) in options.iter() {
            if !method.accepts(key) {
                log::warn!("{method} ignores unknown option `{key}`");
                continue;
            }
            match key {
                "maxiter" => settings.maxiter = count(key, value)?,
                "maxfun" | "maxfev" => settings.budget = count(key, value)?,
                "ftol" => settings.ftol = float(key, value)?,
                "gtol" => settings.gtol = float(key, value)?,
                "xtol" | "xatol" => settings.xtol = float(key, value)?,
                "fatol" => settings.fatol = float(key, value)?,
                "eps" => settings.eps = positive(key, float(key, value)?)?,
                "finite_diff_rel_step" => {
                    settings.relative_step = Some(positive(key, float(key, value)?)?);
                }
                "maxcor" => settings.maxcor = count(key, value)?.max(1),
                "adaptive" => settings.adaptive = flag(key, value)?,
                "disp" => settings.disp = flag(key, value)?,
                "initial_simplex" => settings.initial_simplex = Some(rows(key, value, dim)?),
                "direc" => settings.direc = Some(rows(key, value, dim)?),
                _ => log::debug!("{method} option `{key}` has no effect"),
            }
        }

        if method == Method::Tnc && settings.xtol < 0.0 {
            settings.xtol = f64::EPSILON.sqrt();
        }
        Ok(settings)
    }

    /// Step for a central difference in coordinate `x`.
    pub(super) fn step(&self, x: f64) -> f64 {
        match self.relative_step {
            Some(rel) => rel * x.abs().max(1.0),
            None => self.eps,
        }
    }
}

fn invalid(key: &str, expected: &'static str) -> Error {
    Error::InvalidOption {
        key: key.to_owned(),
        expected,
    }
}

fn count(key: &str, value: &Value) -> Result<usize, Error> {
    value
        .as_usize()
        .ok_or_else(|| invalid(key, "a non-negative integer"))
}

fn float(key: &str, value: &Value) -> Result<f64, Error> {
    value.as_f64().ok_or_else(|| invalid(key, "a number"))
}

fn positive(key: &str, value: f64) -> Result<f64, Error> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(invalid(key, "finite and positive"))
    }
}

fn flag(key: &str, value: &Value) -> Result<bool, Error> {
    value.as_bool().ok_or_else(|| invalid(key, "a boolean"))
}

fn rows(key: &str, value: &Value, dim: usize) -> Result<Vec<Vec<f64>>, Error> {
    let rows = value
        .as_table()
        .ok_or_else(|| invalid(key, "a table of numbers"))?;
    if rows.is_empty() || rows.iter().any(|row| row.len() != dim) {
        return Err(invalid(key, "rows matching the problem dimension"));
    }
    Ok(rows.to_vec())
}
