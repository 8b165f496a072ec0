//! The contract every optimizer adapter implements.
//!
//! An adapter is built from a [`Problem`] in two steps. First the shared
//! [`OptimizerBase`] merges the adapter's defaults with the caller's options
//! and the named limits. Then [`BuildOptimizer::setup`] lets the adapter
//! adjust that state before any evaluation happens. [`Optimizer::optimize`]
//! runs the backend once and returns an [`OptimizeResult`].
//!
//! Backend failures are not caught here. They surface from `optimize` as
//! [`Error::Backend`] with the original error as the source.

use std::any::Any;

use crate::{Action, Callback, Error, Iteration, Objective, Observer, OptimizeResult, Options};

/// Iteration limit used when the caller does not set one.
pub const DEFAULT_MAXITER: usize = 1000;

/// Evaluation limit used when the caller does not set one.
pub const DEFAULT_MAXFUN: usize = 10_000;

/// A `(lower, upper)` pair per parameter.
pub type Bounds = Vec<(f64, f64)>;

/// Everything needed to construct an optimizer.
pub struct Problem {
    objective: Objective,
    x0: Vec<f64>,
    bounds: Option<Bounds>,
    callback: Option<Callback>,
    maxiter: usize,
    maxfun: usize,
    options: Options,
}

impl Problem {
    /// Starts a problem with default limits, no bounds, and no callback.
    #[must_use]
    pub fn new(objective: Objective, x0: Vec<f64>) -> Self {
        Self {
            objective,
            x0,
            bounds: None,
            callback: None,
            maxiter: DEFAULT_MAXITER,
            maxfun: DEFAULT_MAXFUN,
            options: Options::new(),
        }
    }

    #[must_use]
    pub fn bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Sets the callback invoked once per iteration.
    #[must_use]
    pub fn callback<C>(mut self, callback: C) -> Self
    where
        C: for<'a> Observer<Iteration<'a>, Action> + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn maxiter(mut self, maxiter: usize) -> Self {
        self.maxiter = maxiter;
        self
    }

    #[must_use]
    pub fn maxfun(mut self, maxfun: usize) -> Self {
        self.maxfun = maxfun;
        self
    }

    /// Sets one option.
    #[must_use]
    pub fn option(self, key: impl Into<String>, value: impl Into<crate::Value>) -> Self {
        self.options(Options::new().with(key, value))
    }

    /// Merges `options` into the problem's options.
    ///
    /// `maxiter` and `maxfun` entries set the named limits instead of being
    /// stored, so they cannot disagree with [`Problem::maxiter`] and
    /// [`Problem::maxfun`].
    #[must_use]
    pub fn options(mut self, mut options: Options) -> Self {
        if let Some(maxiter) = options.maxiter() {
            self.maxiter = maxiter;
            options.pop(crate::options::MAXITER);
        }
        if let Some(maxfun) = options.maxfun() {
            self.maxfun = maxfun;
            options.pop(crate::options::MAXFUN);
        }
        self.options.update(options);
        self
    }
}

/// State shared by every optimizer: objective, start point, bounds, merged
/// options, and the user callback.
pub struct OptimizerBase {
    objective: Objective,
    x0: Vec<f64>,
    bounds: Option<Bounds>,
    callback: Option<Callback>,
    options: Options,
}

impl OptimizerBase {
    /// Merges options in order: `defaults`, then the problem's options, then
    /// the problem's `maxiter` and `maxfun`.
    #[must_use]
    pub fn new(problem: Problem, defaults: Options) -> Self {
        let mut options = defaults;
        options.update(problem.options);
        options.set_maxiter(problem.maxiter).set_maxfun(problem.maxfun);

        Self {
            objective: problem.objective,
            x0: problem.x0,
            bounds: problem.bounds,
            callback: problem.callback,
            options,
        }
    }

    #[must_use]
    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    #[must_use]
    pub fn x0(&self) -> &[f64] {
        &self.x0
    }

    #[must_use]
    pub fn bounds(&self) -> Option<&[(f64, f64)]> {
        self.bounds.as_deref()
    }

    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Mutable options, for use by [`BuildOptimizer::setup`].
    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    #[must_use]
    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// Passes one iteration to the user callback, if there is one.
    pub fn notify(&mut self, iteration: &Iteration<'_>) -> Option<Action> {
        self.callback.as_deref_mut()?.observe(iteration)
    }

    /// Removes the user callback, for backends that must own their observer
    /// for the duration of a run.
    pub fn take_callback(&mut self) -> Option<Callback> {
        self.callback.take()
    }

    /// Puts back a callback removed by [`OptimizerBase::take_callback`].
    pub fn restore_callback(&mut self, callback: Option<Callback>) {
        self.callback = callback;
    }
}

/// A constructed optimizer, ready to run.
pub trait Optimizer: Any + Send {
    fn base(&self) -> &OptimizerBase;

    fn base_mut(&mut self) -> &mut OptimizerBase;

    /// Runs the backend to completion.
    ///
    /// Implementations must not change `x0` or the bounds, and must fill at
    /// least `x`, `fun`, `nfev`, and `nit`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Backend`] wrapping the backend's own error, or
    /// [`Error::InvalidOption`] if an option has the wrong shape.
    fn optimize(&mut self) -> Result<OptimizeResult, Error>;

    /// Called once per backend iteration; forwards to the user callback.
    fn callback(&mut self, iteration: &Iteration<'_>) -> Option<Action> {
        self.base_mut().notify(iteration)
    }

    fn options(&self) -> &Options {
        self.base().options()
    }

    fn as_any(&self) -> &dyn Any;

    /// The concrete type's name, for diagnostics.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Construction for optimizer types.
pub trait BuildOptimizer: Optimizer + Sized {
    /// Options merged underneath the caller's options.
    #[must_use]
    fn defaults() -> Options {
        Options::new()
    }

    /// Finishes construction from the merged base state.
    ///
    /// # Errors
    ///
    /// Returns an error if the merged options cannot configure this optimizer.
    fn setup(base: OptimizerBase) -> Result<Self, Error>;

    /// Builds the optimizer for `problem`.
    ///
    /// # Errors
    ///
    /// Returns any error raised by [`BuildOptimizer::setup`].
    fn build(problem: Problem) -> Result<Self, Error> {
        Self::setup(OptimizerBase::new(problem, Self::defaults()))
    }

    /// Builds the optimizer and runs it once.
    ///
    /// # Errors
    ///
    /// Returns any construction or backend error.
    fn fmin(problem: Problem) -> Result<OptimizeResult, Error> {
        Self::build(problem)?.optimize()
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;
    use crate::Value;

    fn problem() -> Problem {
        let objective = Objective::new(|x: &[f64]| Ok::<_, Infallible>(x.iter().sum()));
        Problem::new(objective, vec![1.0, 2.0])
    }

    #[test]
    fn merges_defaults_then_options_then_limits() {
        let defaults = Options::new()
            .with("verb_disp", 100)
            .with("n_jobs", 1)
            .with("maxiter", 5);
        let problem = problem()
            .options(Options::new().with("n_jobs", 4).with("maxfun", 50))
            .maxiter(20);

        let base = OptimizerBase::new(problem, defaults);

        assert_eq!(base.options().get("verb_disp"), Some(&Value::Int(100)));
        assert_eq!(base.options().get("n_jobs"), Some(&Value::Int(4)));
        assert_eq!(base.options().maxiter(), Some(20));
        assert_eq!(base.options().maxfun(), Some(50));
    }

    #[test]
    fn default_limits_are_always_present() {
        let base = OptimizerBase::new(problem(), Options::new());
        assert_eq!(base.options().maxiter(), Some(DEFAULT_MAXITER));
        assert_eq!(base.options().maxfun(), Some(DEFAULT_MAXFUN));
        assert!(base.bounds().is_none());
        assert!(!base.has_callback());
    }

    #[test]
    fn notify_reaches_the_callback() {
        let problem = problem().callback(|it: &Iteration<'_>| {
            (it.iteration >= 3).then_some(Action::StopEarly)
        });
        let mut base = OptimizerBase::new(problem, Options::new());

        let at = |iteration| Iteration {
            iteration,
            evaluations: iteration * 4,
            x: &[0.0],
            fun: 1.0,
        };
        assert_eq!(base.notify(&at(1)), None);
        assert_eq!(base.notify(&at(3)), Some(Action::StopEarly));

        let callback = base.take_callback();
        assert_eq!(base.notify(&at(3)), None);
        base.restore_callback(callback);
        assert_eq!(base.notify(&at(3)), Some(Action::StopEarly));
    }
}
