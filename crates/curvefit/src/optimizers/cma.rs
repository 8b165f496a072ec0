use std::any::Any;

use curvefit_core::{
    Action, BuildOptimizer, Error, Iteration, OptimizeResult, Optimizer, OptimizerBase, Options,
    Value,
};
use curvefit_solvers::cma::{self, RunLimits};

use super::checked;

const STDS: &str = "stds";
const MIN_ITERATIONS: &str = "min_iterations";
const N_JOBS: &str = "n_jobs";
const VERB_DISP: &str = "verb_disp";

/// Named accessors for the evolution strategy adapter's options.
pub trait CmaOptions {
    /// Initial per-parameter spread.
    fn stds(&self) -> Option<Vec<f64>>;

    fn set_stds(&mut self, stds: Vec<f64>) -> &mut Self;

    /// Generations to run before a termination criterion may end the run.
    fn min_iterations(&self) -> Option<usize>;

    /// Worker threads for objective evaluation.
    fn n_jobs(&self) -> Option<usize>;

    /// Log progress every this many generations; `0` disables progress lines.
    fn verb_disp(&self) -> Option<usize>;
}

impl CmaOptions for Options {
    fn stds(&self) -> Option<Vec<f64>> {
        self.get(STDS).and_then(Value::as_list)
    }

    fn set_stds(&mut self, stds: Vec<f64>) -> &mut Self {
        self.insert(STDS, stds);
        self
    }

    fn min_iterations(&self) -> Option<usize> {
        self.get(MIN_ITERATIONS).and_then(Value::as_usize)
    }

    fn n_jobs(&self) -> Option<usize> {
        self.get(N_JOBS).and_then(Value::as_usize)
    }

    fn verb_disp(&self) -> Option<usize> {
        self.get(VERB_DISP).and_then(Value::as_usize)
    }
}

/// CMA-ES adapter.
///
/// `stds` is taken out of the options at setup and passed to the backend as
/// its per-dimension initial spread. Keys the backend does not know are
/// dropped before the run. The initial step size is fixed at
/// [`CmaEsOptimizer::SIGMA0`], so `stds` sets the actual search scale.
pub struct CmaEsOptimizer {
    base: OptimizerBase,
    stds: Option<Vec<f64>>,
}

impl CmaEsOptimizer {
    pub const NAME: &'static str = "PYCMA-CMAES";

    pub const SIGMA0: f64 = 1.0;

    #[must_use]
    pub fn stds(&self) -> Option<&[f64]> {
        self.stds.as_deref()
    }

    fn limits(&self) -> Result<RunLimits, Error> {
        let options = self.base.options();
        let count = |key, value| checked(options, key, value, "a non-negative integer");

        Ok(RunLimits {
            iterations: options.maxiter(),
            maxfun: options.maxfun(),
            min_iterations: count(MIN_ITERATIONS, options.min_iterations())?.unwrap_or(1),
            verb_disp: count(VERB_DISP, options.verb_disp())?,
            n_jobs: count(N_JOBS, options.n_jobs())?.unwrap_or(1).max(1),
        })
    }

    /// The merged options reduced to what the backend accepts, plus the
    /// spread and bounds in its layout.
    fn backend_options(&self) -> Options {
        let mut options = self.base.options().clone();

        let dropped: Vec<&str> = self
            .base
            .options()
            .keys()
            .filter(|key| !cma::accepts(key))
            .collect();
        if !dropped.is_empty() {
            log::debug!("{}: dropping options {dropped:?}", Self::NAME);
        }
        options.retain(cma::accepts);

        if let Some(stds) = &self.stds {
            options.insert("CMA_stds", stds.clone());
        }
        if let Some(bounds) = self.base.bounds() {
            let (lower, upper): (Vec<f64>, Vec<f64>) = bounds.iter().copied().unzip();
            options.insert("bounds", vec![lower, upper]);
        }
        options
    }
}

impl BuildOptimizer for CmaEsOptimizer {
    fn defaults() -> Options {
        Options::new()
            .with(MIN_ITERATIONS, 10)
            .with(N_JOBS, 1)
            .with(VERB_DISP, 100)
    }

    fn setup(mut base: OptimizerBase) -> Result<Self, Error> {
        let stds = checked(base.options(), STDS, base.options().stds(), "a list of numbers")?;
        base.options_mut().pop(STDS);
        Ok(Self { base, stds })
    }
}

impl Optimizer for CmaEsOptimizer {
    fn base(&self) -> &OptimizerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut OptimizerBase {
        &mut self.base
    }

    fn optimize(&mut self) -> Result<OptimizeResult, Error> {
        let limits = self.limits()?;
        let options = self.backend_options();
        let objective = self.base.objective().clone();
        let x0 = self.base.x0().to_vec();

        let mut callback = self.base.take_callback();
        let run = cma::minimize(
            |x: &[f64]| objective.call(x),
            &x0,
            Self::SIGMA0,
            &options,
            &limits,
            |event: &cma::Event<'_>| {
                let iteration = Iteration {
                    iteration: event.iteration,
                    evaluations: event.evaluations,
                    x: event.xbest,
                    fun: event.fbest,
                };
                callback
                    .as_deref_mut()?
                    .observe(&iteration)
                    .map(|Action::StopEarly| cma::Action::StopEarly)
            },
        );
        self.base.restore_callback(callback);

        let solution = run.map_err(Error::backend)?;
        Ok(OptimizeResult {
            x: solution.xbest,
            stds: solution.stds,
            fun: solution.fbest,
            nfev: solution.evaluations,
            nit: solution.iterations,
            sigma: Some(solution.sigma),
            evals_best: Some(solution.evals_best),
            stop: Some(solution.stop),
            ..OptimizeResult::default()
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use curvefit_core::{Objective, Problem};

    use super::*;

    fn sphere() -> Objective {
        Objective::new(|x: &[f64]| Ok::<_, Infallible>(x.iter().map(|v| (v - 0.5).powi(2)).sum()))
    }

    fn problem() -> Problem {
        Problem::new(sphere(), vec![0.0, 0.0, 0.0])
            .option("seed", 3)
            .option("verbose", -9)
    }

    #[test]
    fn setup_takes_out_stds() {
        let optimizer = CmaEsOptimizer::build(problem().option(STDS, vec![0.1, 0.2, 0.3])).unwrap();

        assert_eq!(optimizer.stds(), Some([0.1, 0.2, 0.3].as_slice()));
        assert!(!optimizer.options().contains(STDS));
        assert_eq!(optimizer.options().min_iterations(), Some(10));
        assert_eq!(optimizer.options().n_jobs(), Some(1));
        assert_eq!(optimizer.options().verb_disp(), Some(100));
    }

    #[test]
    fn backend_sees_only_known_options() {
        let problem = problem()
            .bounds(vec![(0.0, 1.0), (-1.0, 1.0), (0.0, 2.0)])
            .option(STDS, vec![0.1, 0.1, 0.1])
            .option("gtol", 1e-6);
        let optimizer = CmaEsOptimizer::build(problem).unwrap();

        let options = optimizer.backend_options();
        assert!(options.keys().all(cma::accepts));
        assert!(!options.contains("gtol"));
        assert!(!options.contains(N_JOBS));
        assert_eq!(
            options.get("bounds").and_then(Value::as_table),
            Some([vec![0.0, -1.0, 0.0], vec![1.0, 1.0, 2.0]].as_slice())
        );
        assert_eq!(
            options.get("CMA_stds").and_then(Value::as_list),
            Some(vec![0.1, 0.1, 0.1])
        );
    }

    #[test]
    fn unbounded_runs_pass_no_bounds() {
        let optimizer = CmaEsOptimizer::build(problem()).unwrap();
        assert!(!optimizer.backend_options().contains("bounds"));
    }

    #[test]
    fn fills_evolution_strategy_fields() {
        let result = CmaEsOptimizer::fmin(problem().option(STDS, vec![0.3, 0.3, 0.3])).unwrap();

        assert!(result.fun < 1e-8);
        for x in &result.x {
            assert!((x - 0.5).abs() < 1e-3);
        }
        assert_eq!(result.stds.len(), 3);
        assert!(result.nfev >= result.evals_best.unwrap());
        assert!(result.nit >= 10);
        assert!(result.sigma.is_some());
        assert!(!result.stop.unwrap().is_empty());
        assert_eq!(result.success, None);
    }

    #[test]
    fn callback_sees_generations_and_can_stop() {
        let problem = problem().callback(|it: &Iteration<'_>| {
            assert_eq!(it.x.len(), 3);
            (it.iteration == 4).then_some(Action::StopEarly)
        });
        let mut optimizer = CmaEsOptimizer::build(problem).unwrap();

        let result = optimizer.optimize().unwrap();
        assert_eq!(result.nit, 4);
        assert!(result.stop.unwrap().contains_key("callback"));
        assert!(optimizer.base().has_callback());
    }

    #[test]
    fn rejects_malformed_adapter_options() {
        let error = CmaEsOptimizer::build(problem().option(STDS, "wide")).err().unwrap();
        assert!(matches!(error, Error::InvalidOption { ref key, .. } if key == STDS));

        let mut optimizer = CmaEsOptimizer::build(problem().option(N_JOBS, -2)).unwrap();
        let error = optimizer.optimize().unwrap_err();
        assert!(matches!(error, Error::InvalidOption { ref key, .. } if key == N_JOBS));
    }

    #[test]
    fn backend_errors_pass_through() {
        let failing = Objective::new(|_: &[f64]| Err::<f64, _>("model blew up"));
        let error = CmaEsOptimizer::fmin(Problem::new(failing, vec![0.0]).option("verbose", -9))
            .unwrap_err();

        let Error::Backend(source) = error else {
            panic!("expected a backend error");
        };
        assert!(matches!(
            source.downcast_ref::<cma::Error>(),
            Some(cma::Error::Objective(inner)) if inner.to_string() == "model blew up"
        ));
    }
}
