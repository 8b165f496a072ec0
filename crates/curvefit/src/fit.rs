use std::{collections::BTreeMap, time::Instant};

use curvefit_core::{Objective, OptimizeResult, Options, Problem, Registry, Value};

use crate::{
    CmaOptions, Data, Equation, Error, ParameterSpec,
    fitness::{self, FitnessArgs},
    optimizers::CmaEsOptimizer,
    registry,
};

/// Fits the parameters of an equation to target data.
///
/// Symbols of the equation that are not data columns are the parameters.
/// Each one needs an initial value, a `(lower, upper)` bound, and a spread
/// (the initial search scale for evolution strategies). The fit minimizes the
/// root-mean-square residual with the chosen optimizer, `"PYCMA-CMAES"` by
/// default.
///
/// ```no_run
/// use curvefit::{CurveFit, Data};
///
/// let x: Vec<f64> = (0..50).map(|i| f64::from(i) / 49.0).collect();
/// let target = x.iter().map(|x| 3.0 * x - 1.0).collect();
///
/// let result = CurveFit::new("m * x + q", Data::from([("x".into(), x)]), target)
///     .initial("m", 1.0)
///     .initial("q", 0.0)
///     .bound("m", (0.0, 5.0))
///     .bound("q", (-2.0, 2.0))
///     .spread("m", 0.5)
///     .spread("q", 0.5)
///     .fit()?;
///
/// println!("{:?}", result.parameters);
/// # Ok::<(), curvefit::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct CurveFit {
    equation: String,
    data: Data,
    target: Vec<f64>,
    initials: BTreeMap<String, f64>,
    bounds: BTreeMap<String, (f64, f64)>,
    spreads: BTreeMap<String, f64>,
    method: String,
    options: Options,
}

impl CurveFit {
    #[must_use]
    pub fn new(equation: impl Into<String>, data: Data, target: Vec<f64>) -> Self {
        Self {
            equation: equation.into(),
            data,
            target,
            initials: BTreeMap::new(),
            bounds: BTreeMap::new(),
            spreads: BTreeMap::new(),
            method: CmaEsOptimizer::NAME.to_owned(),
            options: Options::new(),
        }
    }

    #[must_use]
    pub fn initial(mut self, name: impl Into<String>, value: f64) -> Self {
        self.initials.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn bound(mut self, name: impl Into<String>, bound: (f64, f64)) -> Self {
        self.bounds.insert(name.into(), bound);
        self
    }

    #[must_use]
    pub fn spread(mut self, name: impl Into<String>, spread: f64) -> Self {
        self.spreads.insert(name.into(), spread);
        self
    }

    /// Selects the optimizer by registry identifier.
    #[must_use]
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    #[must_use]
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key, value);
        self
    }

    /// Merges `options` into the optimizer options.
    #[must_use]
    pub fn options(mut self, options: Options) -> Self {
        self.options.update(options);
        self
    }

    /// Runs the fit with an optimizer from the process-wide registry.
    ///
    /// # Errors
    ///
    /// See [`CurveFit::fit_with`].
    pub fn fit(self) -> Result<OptimizeResult, Error> {
        self.fit_with(&registry::snapshot())
    }

    /// Runs the fit with an optimizer from `registry`.
    ///
    /// The result carries the run's `duration` in seconds, the parameter
    /// names as `optimize_keys`, and the fitted values as `parameters`.
    ///
    /// # Errors
    ///
    /// Fails before any optimization if the equation does not parse, a
    /// parameter lacks an initial value, bound, or spread, the method is not
    /// registered, or the data does not line up with the target. Optimizer
    /// failures are returned as they were raised.
    pub fn fit_with(self, registry: &Registry) -> Result<OptimizeResult, Error> {
        let equation = Equation::parse(&self.equation)?;
        let names = equation.parameters(&self.data);

        let x0 = lookup(&names, &self.initials, ParameterSpec::Initial)?;
        let bounds = lookup(&names, &self.bounds, ParameterSpec::Bound)?;
        let stds = lookup(&names, &self.spreads, ParameterSpec::Spread)?;

        let implementation = registry.resolve(&self.method)?;
        let args = FitnessArgs::new(names.clone(), self.data, self.target, equation)?;
        let initial_fitness = fitness::fitness(&x0, &args)?;

        log::info!("calibrating `{}` with {}", self.equation, self.method);
        log::info!("parameters: {names:?}");
        log::info!("initial fitness: {initial_fitness:.6e}");
        log::debug!("initials: {x0:?}");
        log::debug!("bounds: {bounds:?}");
        log::debug!("stds: {stds:?}");

        let mut options = self.options;
        options.set_stds(stds);
        let problem = Problem::new(Objective::with_args(fitness::fitness, args), x0)
            .bounds(bounds)
            .options(options);

        let start = Instant::now();
        let mut result = implementation.fmin(problem)?;
        result.duration = start.elapsed().as_secs_f64();

        result.parameters = names.iter().cloned().zip(result.x.iter().copied()).collect();
        result.optimize_keys = names;

        log::info!("calibration finished, took {:.3} seconds", result.duration);
        log::info!("optimized parameters: {:?}", result.parameters);
        log::info!("final fitness: {:.6e}", result.fun);
        Ok(result)
    }
}

fn lookup<T: Copy>(
    names: &[String],
    values: &BTreeMap<String, T>,
    spec: ParameterSpec,
) -> Result<Vec<T>, Error> {
    names
        .iter()
        .map(|name| {
            values
                .get(name)
                .copied()
                .ok_or_else(|| Error::MissingParameterSpec {
                    name: name.clone(),
                    spec,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> CurveFit {
        let x = vec![0.0, 1.0, 2.0];
        let target = vec![1.0, 3.0, 5.0];
        CurveFit::new("m * x + q", Data::from([("x".to_owned(), x)]), target)
            .initial("m", 1.0)
            .initial("q", 0.0)
            .bound("m", (0.0, 4.0))
            .bound("q", (-2.0, 2.0))
            .spread("m", 0.5)
            .spread("q", 0.5)
    }

    #[test]
    fn missing_specs_are_named() {
        let mut fit = line().initial("d", 0.0);
        fit.equation = "m * x + q + d".to_owned();
        assert!(matches!(
            fit.fit_with(&registry::builtin()),
            Err(Error::MissingParameterSpec { ref name, spec: ParameterSpec::Bound }) if name == "d"
        ));

        let error = CurveFit::new("m * x", Data::from([("x".to_owned(), vec![1.0])]), vec![2.0])
            .initial("m", 1.0)
            .bound("m", (0.0, 1.0))
            .fit_with(&registry::builtin())
            .unwrap_err();
        assert!(matches!(
            error,
            Error::MissingParameterSpec { ref name, spec: ParameterSpec::Spread } if name == "m"
        ));
    }

    #[test]
    fn unknown_methods_fail_before_running() {
        let error = line()
            .method("Simulated-Annealing")
            .fit_with(&registry::builtin())
            .unwrap_err();
        assert!(matches!(
            error,
            Error::Optimizer(curvefit_core::Error::UnknownOptimizer { ref name })
                if name == "Simulated-Annealing"
        ));
    }

    #[test]
    fn result_is_labelled_with_parameter_names() {
        let result = line()
            .method("Scipy-NelderMead")
            .option("fatol", 1e-12)
            .fit_with(&registry::builtin())
            .unwrap();

        assert_eq!(result.optimize_keys, ["m", "q"]);
        assert_eq!(result.parameters.len(), 2);
        assert_eq!(result.parameters["m"], result.x[0]);
        assert_eq!(result.parameters["q"], result.x[1]);
        assert!(result.duration >= 0.0);
        assert!(result.fun < 1e-4);
    }
}
