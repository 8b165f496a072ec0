use std::{
    any::Any,
    marker::PhantomData,
    sync::{Arc, Mutex, PoisonError},
};

use curvefit_core::{
    Action, BuildOptimizer, Error, Iteration, OptimizeResult, Optimizer, OptimizerBase, Options,
    Value,
    options::{MAXFUN, MAXITER},
};
use curvefit_solvers::minimize::{self, Method};

const MAXFEV: &str = "maxfev";

/// Named accessors for local search options.
pub trait LocalOptions {
    /// Evaluation limit under the key Nelder-Mead and Powell read.
    fn maxfev(&self) -> Option<usize>;

    fn set_maxfev(&mut self, maxfev: usize) -> &mut Self;
}

impl LocalOptions for Options {
    fn maxfev(&self) -> Option<usize> {
        self.get(MAXFEV).and_then(Value::as_usize)
    }

    fn set_maxfev(&mut self, maxfev: usize) -> &mut Self {
        self.insert(MAXFEV, maxfev);
        self
    }
}

/// One local search method, as plugged into [`LocalSearchOptimizer`].
pub trait LocalMethod: Send + 'static {
    /// Registry identifier.
    const NAME: &'static str;

    const METHOD: Method;

    /// Option keys the method reads.
    const OPTIONS: &'static [&'static str] = Self::METHOD.option_keys();
}

/// Adapter shared by the local search methods.
///
/// Nelder-Mead and Powell take their evaluation limit as `maxfev`, so setup
/// moves `maxfun` there for those two methods.
pub struct LocalSearchOptimizer<M> {
    base: OptimizerBase,
    method: PhantomData<fn() -> M>,
}

impl<M: LocalMethod> LocalSearchOptimizer<M> {
    pub const NAME: &'static str = M::NAME;

    #[must_use]
    pub fn method(&self) -> Method {
        M::METHOD
    }
}

impl<M: LocalMethod> BuildOptimizer for LocalSearchOptimizer<M> {
    fn setup(mut base: OptimizerBase) -> Result<Self, Error> {
        if M::METHOD.budget_key() == MAXFEV && base.options().contains(MAXITER) {
            base.options_mut().rename(MAXFUN, MAXFEV);
        }
        Ok(Self {
            base,
            method: PhantomData,
        })
    }
}

impl<M: LocalMethod> Optimizer for LocalSearchOptimizer<M> {
    fn base(&self) -> &OptimizerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut OptimizerBase {
        &mut self.base
    }

    fn optimize(&mut self) -> Result<OptimizeResult, Error> {
        let shared = Arc::new(Mutex::new(self.base.take_callback()));
        let relay = {
            let shared = Arc::clone(&shared);
            move |event: &minimize::Event<'_>| {
                let iteration = Iteration {
                    iteration: event.iteration,
                    evaluations: event.evaluations,
                    x: event.x,
                    fun: event.fun,
                };
                let mut callback = shared.lock().unwrap_or_else(PoisonError::into_inner);
                let action = callback.as_deref_mut()?.observe(&iteration);
                action.map(|Action::StopEarly| minimize::Action::StopEarly)
            }
        };

        let objective = self.base.objective();
        let run = minimize::minimize(
            |x: &[f64]| objective.call(x),
            self.base.x0(),
            self.base.bounds(),
            M::METHOD,
            self.base.options(),
            relay,
        );

        let callback = shared.lock().unwrap_or_else(PoisonError::into_inner).take();
        self.base.restore_callback(callback);

        let solution = run.map_err(Error::backend)?;
        Ok(OptimizeResult {
            x: solution.x,
            fun: solution.fun,
            nfev: solution.nfev,
            nit: solution.nit,
            success: Some(solution.success),
            status: Some(solution.status),
            message: Some(solution.message),
            jac: solution.jac,
            hess: solution.hess,
            njev: solution.njev,
            nhev: solution.nhev,
            maxcv: solution.maxcv,
            ..OptimizeResult::default()
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Limited-memory BFGS with box bounds.
pub struct LBfgsB;

impl LocalMethod for LBfgsB {
    const NAME: &'static str = "Scipy-LBFGSB";
    const METHOD: Method = Method::LBfgsB;
}

/// Downhill simplex.
pub struct NelderMead;

impl LocalMethod for NelderMead {
    const NAME: &'static str = "Scipy-NelderMead";
    const METHOD: Method = Method::NelderMead;
}

/// Conjugate direction set.
pub struct Powell;

impl LocalMethod for Powell {
    const NAME: &'static str = "Scipy-Powell";
    const METHOD: Method = Method::Powell;
}

/// Truncated Newton.
pub struct Tnc;

impl LocalMethod for Tnc {
    const NAME: &'static str = "Scipy-TNC";
    const METHOD: Method = Method::Tnc;
}

pub type LbfgsbOptimizer = LocalSearchOptimizer<LBfgsB>;
pub type NelderMeadOptimizer = LocalSearchOptimizer<NelderMead>;
pub type PowellOptimizer = LocalSearchOptimizer<Powell>;
pub type TncOptimizer = LocalSearchOptimizer<Tnc>;
