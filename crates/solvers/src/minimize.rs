//! Local search over a parameter vector with optional box bounds.
//!
//! # Methods
//!
//! - [`Method::LBfgsB`]: limited-memory BFGS with a More-Thuente line search
//! - [`Method::NelderMead`]: downhill simplex, optionally with
//!   dimension-adapted coefficients
//! - [`Method::Powell`]: conjugate direction set with Brent line searches
//! - [`Method::Tnc`]: truncated Newton (Newton-CG)
//!
//! Gradients and Hessians are estimated with central finite differences.
//!
//! # Bounds
//!
//! Every point is projected into the bounds before it is evaluated, and
//! gradient components that point out of the box at an active bound are
//! dropped. The reported point is always feasible.
//!
//! # Limits
//!
//! The evaluation budget (`maxfun` or `maxfev`, depending on the method)
//! counts every objective call, finite-difference probes included. Exhausting
//! it, reaching `maxiter`, or a stop request from the observer all end the run
//! with the best point evaluated so far and a [`Status`] saying why.
//!
//! # Observer Events
//!
//! The search emits one [`Event`] per iteration. Observers can return
//! [`Action::StopEarly`] to end the run after that iteration.

mod action;
mod error;
mod event;
mod method;
mod powell;
mod problem;
mod relay;
mod settings;
mod solution;

#[cfg(test)]
mod tests;

pub use action::Action;
pub use error::Error;
pub use event::Event;
pub use method::Method;
pub use solution::{Solution, Status};

use std::sync::Arc;

use argmin::{
    core::{
        Error as ArgminError, Executor, State, TerminationReason, TerminationStatus,
        observers::ObserverMode,
    },
    solver::{
        linesearch::MoreThuenteLineSearch, neldermead::NelderMead, newton::NewtonCG,
        quasinewton::LBFGS,
    },
};
use curvefit_core::{BoxError, Observer, Options};
use nalgebra::DMatrix;

use problem::{Halt, Record, Tracked};
use relay::Relay;
use settings::Settings;

/// Minimizes the objective with a local search method, starting from `x0`.
///
/// Keys in `options` that `method` does not read are logged and ignored.
/// The observer receives an [`Event`] once per iteration; it is shared with
/// the numerical engine for the duration of the run, hence the `'static` bound.
///
/// # Errors
///
/// Returns an error if the start point, bounds, or options are invalid, or
/// with the objective's own error if an evaluation fails.
pub fn minimize<F, E, Obs>(
    objective: F,
    x0: &[f64],
    bounds: Option<&[(f64, f64)]>,
    method: Method,
    options: &Options,
    observer: Obs,
) -> Result<Solution, Error>
where
    F: Fn(&[f64]) -> Result<f64, E>,
    E: Into<BoxError>,
    Obs: for<'a> Observer<Event<'a>, Action> + Send + 'static,
{
    validate(x0, bounds)?;
    let settings = Settings::new(method, x0.len(), options)?;

    let objective = move |x: &[f64]| -> Result<f64, BoxError> { objective(x).map_err(Into::into) };
    let start = project(x0, bounds);
    let record = Arc::new(Record::new(&start));
    let problem = Tracked::new(&objective, bounds, &settings, Arc::clone(&record));
    let relay = Relay::new(observer, Arc::clone(&record));

    let run = match method {
        Method::LBfgsB => lbfgsb(problem, start, &settings, relay)?,
        Method::NelderMead => nelder_mead(problem, &start, &settings, relay)?,
        Method::Powell => powell::run(&problem, &start, &settings, &relay).map(Outcome::from),
        Method::Tnc => tnc(problem, start, &settings, relay)?,
    };

    let solution = settle(method, run, &record, bounds)?;
    if settings.disp {
        log::info!(
            "{method}: {} fun = {:.6e} after {} iterations and {} evaluations",
            solution.message,
            solution.fun,
            solution.nit,
            solution.nfev,
        );
    } else {
        log::debug!("{method}: {}", solution.message);
    }
    Ok(solution)
}

/// Minimizes the objective with a local search method without observer support.
///
/// This is a convenience wrapper around [`minimize`] that uses a no-op observer.
///
/// # Errors
///
/// Returns an error if the start point, bounds, or options are invalid, or
/// with the objective's own error if an evaluation fails.
pub fn minimize_unobserved<F, E>(
    objective: F,
    x0: &[f64],
    bounds: Option<&[(f64, f64)]>,
    method: Method,
    options: &Options,
) -> Result<Solution, Error>
where
    F: Fn(&[f64]) -> Result<f64, E>,
    E: Into<BoxError>,
{
    minimize(objective, x0, bounds, method, options, ())
}

/// How the engine reported the end of a run that it finished on its own.
struct Outcome {
    reason: Status,
    detail: Option<String>,
    jac: Option<Vec<f64>>,
    hess: Option<Vec<Vec<f64>>>,
}

impl Outcome {
    fn new(status: &TerminationStatus) -> Self {
        let (reason, detail) = match status {
            TerminationStatus::Terminated(
                TerminationReason::SolverConverged | TerminationReason::TargetCostReached,
            ) => (Status::Converged, None),
            TerminationStatus::Terminated(TerminationReason::MaxItersReached) => {
                (Status::IterationLimit, None)
            }
            TerminationStatus::Terminated(TerminationReason::SolverExit(message)) => {
                (Status::Abnormal, Some(message.clone()))
            }
            other => (Status::Abnormal, Some(format!("{other:?}"))),
        };
        Self {
            reason,
            detail,
            jac: None,
            hess: None,
        }
    }

    fn halted(reason: Status, detail: Option<String>) -> Self {
        Self {
            reason,
            detail,
            jac: None,
            hess: None,
        }
    }
}

impl From<powell::Exit> for Outcome {
    fn from(exit: powell::Exit) -> Self {
        let reason = match exit {
            powell::Exit::Converged => Status::Converged,
            powell::Exit::IterationLimit => Status::IterationLimit,
        };
        Self::halted(reason, None)
    }
}

fn setup(error: ArgminError) -> Error {
    Error::Setup(error.into())
}

fn iteration_limit(settings: &Settings) -> u64 {
    u64::try_from(settings.maxiter).unwrap_or(u64::MAX)
}

fn lbfgsb<Obs>(
    problem: Tracked<'_>,
    start: Vec<f64>,
    settings: &Settings,
    relay: Relay<Obs>,
) -> Result<Result<Outcome, ArgminError>, Error>
where
    Obs: for<'a> Observer<Event<'a>, Action> + Send + 'static,
{
    let solver = LBFGS::new(MoreThuenteLineSearch::new(), settings.maxcor)
        .with_tolerance_grad(settings.gtol)
        .map_err(setup)?
        .with_tolerance_cost(settings.ftol)
        .map_err(setup)?;

    let run = Executor::new(problem, solver)
        .configure(|state| state.param(start).max_iters(iteration_limit(settings)))
        .add_observer(relay, ObserverMode::Always)
        .run()
        .map(|result| {
            let state = result.state();
            Outcome {
                jac: state.get_gradient().cloned(),
                ..Outcome::new(state.get_termination_status())
            }
        });
    Ok(run)
}

fn nelder_mead<Obs>(
    problem: Tracked<'_>,
    start: &[f64],
    settings: &Settings,
    relay: Relay<Obs>,
) -> Result<Result<Outcome, ArgminError>, Error>
where
    Obs: for<'a> Observer<Event<'a>, Action> + Send + 'static,
{
    let dim = start.len();
    let simplex: Vec<Vec<f64>> = match &settings.initial_simplex {
        Some(rows) if rows.len() == dim + 1 => {
            let simplex: Vec<Vec<f64>> = rows.iter().map(|row| problem.project(row)).collect();
            if !spans_free_coordinates(&simplex, |i| problem.limits(i)) {
                return Err(Error::InvalidOption {
                    key: "initial_simplex".to_owned(),
                    expected: "affinely independent vertices within the bounds",
                });
            }
            simplex
        }
        Some(_) => {
            return Err(Error::InvalidOption {
                key: "initial_simplex".to_owned(),
                expected: "one more row than the problem dimension",
            });
        }
        None => initial_simplex(start, |i| problem.limits(i)),
    };

    let mut solver = NelderMead::new(simplex)
        .with_sd_tolerance(settings.fatol)
        .map_err(setup)?;
    if settings.adaptive && dim > 1 {
        #[allow(clippy::cast_precision_loss)]
        let n = dim as f64;
        // Contraction is capped at 0.5, the largest value the engine accepts.
        solver = solver
            .with_alpha(1.0)
            .and_then(|s| s.with_gamma(1.0 + 2.0 / n))
            .and_then(|s| s.with_rho((0.75 - 0.5 / n).min(0.5)))
            .and_then(|s| s.with_sigma(1.0 - 1.0 / n))
            .map_err(setup)?;
    }

    let run = Executor::new(problem, solver)
        .configure(|state| state.max_iters(iteration_limit(settings)))
        .add_observer(relay, ObserverMode::Always)
        .run()
        .map(|result| Outcome::new(result.state().get_termination_status()));
    Ok(run)
}

fn tnc<Obs>(
    problem: Tracked<'_>,
    start: Vec<f64>,
    settings: &Settings,
    relay: Relay<Obs>,
) -> Result<Result<Outcome, ArgminError>, Error>
where
    Obs: for<'a> Observer<Event<'a>, Action> + Send + 'static,
{
    let solver = NewtonCG::new(MoreThuenteLineSearch::new())
        .with_tolerance(settings.ftol.max(f64::EPSILON))
        .map_err(setup)?;

    let run = Executor::new(problem, solver)
        .configure(|state| state.param(start).max_iters(iteration_limit(settings)))
        .add_observer(relay, ObserverMode::Always)
        .run()
        .map(|result| {
            let state = result.state();
            Outcome {
                jac: state.get_gradient().cloned(),
                hess: state.get_hessian().cloned(),
                ..Outcome::new(state.get_termination_status())
            }
        });
    Ok(run)
}

/// Turns the engine's exit into a solution, reading counters and the best
/// point from the shared record.
fn settle(
    method: Method,
    run: Result<Outcome, ArgminError>,
    record: &Record,
    bounds: Option<&[(f64, f64)]>,
) -> Result<Solution, Error> {
    if let Some(error) = record.take_failure() {
        return Err(Error::Objective(error));
    }

    let outcome = match run {
        Ok(outcome) => outcome,
        Err(error) => match record.halted() {
            Some(Halt::Budget) => Outcome::halted(Status::EvaluationLimit, None),
            Some(Halt::Observer) => Outcome::halted(Status::StoppedByObserver, None),
            None => Outcome::halted(Status::Abnormal, Some(error.to_string())),
        },
    };

    let (x, fun) = record.best();
    let mut solution = Solution::new(outcome.reason, outcome.detail, x, fun);
    solution.nfev = record.evaluations();
    solution.nit = record.iterations();
    if method.uses_gradient() {
        solution.njev = Some(record.gradients());
        solution.jac = outcome.jac;
    }
    if method == Method::Tnc {
        solution.nhev = Some(record.hessians());
        solution.hess = outcome.hess;
    }
    solution.maxcv = bounds.map(|bounds| violation(&solution.x, bounds));
    Ok(solution)
}

fn validate(x0: &[f64], bounds: Option<&[(f64, f64)]>) -> Result<(), Error> {
    if x0.is_empty() {
        return Err(Error::EmptyStart);
    }
    if let Some(bounds) = bounds {
        if bounds.len() != x0.len() {
            return Err(Error::BoundsLength {
                got: bounds.len(),
                expected: x0.len(),
            });
        }
        if let Some(index) = bounds.iter().position(|(lo, hi)| !(lo <= hi)) {
            return Err(Error::Bounds { index });
        }
    }
    Ok(())
}

fn project(x: &[f64], bounds: Option<&[(f64, f64)]>) -> Vec<f64> {
    match bounds {
        Some(bounds) => x
            .iter()
            .zip(bounds)
            .map(|(&v, &(lo, hi))| v.clamp(lo, hi))
            .collect(),
        None => x.to_vec(),
    }
}

/// Start point plus one vertex per coordinate, displaced by 5%, or by
/// 0.00025 where the coordinate is zero.
///
/// A displacement that would leave the bounds is taken in the opposite
/// direction instead. When neither direction fits, the vertex goes half way
/// to the farther bound. Only coordinates with `lo == hi` end up flat.
fn initial_simplex(x0: &[f64], limits: impl Fn(usize) -> (f64, f64)) -> Vec<Vec<f64>> {
    let mut simplex = vec![x0.to_vec()];
    for (k, &v) in x0.iter().enumerate() {
        let (lo, hi) = limits(k);
        let mut step = if v == 0.0 { 0.000_25 } else { 0.05 * v };
        if !(lo..=hi).contains(&(v + step)) {
            step = -step;
        }

        let mut vertex = x0.to_vec();
        vertex[k] = (v + step).clamp(lo, hi);
        if vertex[k] == v && (hi - lo).is_finite() {
            let far = if hi - v > v - lo { hi } else { lo };
            vertex[k] = v + 0.5 * (far - v);
        }
        simplex.push(vertex);
    }
    simplex
}

/// Whether the edges of `simplex` span every coordinate with room to move.
fn spans_free_coordinates(simplex: &[Vec<f64>], limits: impl Fn(usize) -> (f64, f64)) -> bool {
    let Some((base, rest)) = simplex.split_first() else {
        return false;
    };
    let free: Vec<usize> = (0..base.len())
        .filter(|&i| {
            let (lo, hi) = limits(i);
            lo < hi
        })
        .collect();
    if free.is_empty() {
        return true;
    }

    let edges = DMatrix::from_fn(rest.len(), free.len(), |r, c| {
        rest[r][free[c]] - base[free[c]]
    });
    let scale = edges.amax().max(f64::MIN_POSITIVE);
    edges.rank(scale * 1e-10) == free.len()
}

fn violation(x: &[f64], bounds: &[(f64, f64)]) -> f64 {
    x.iter()
        .zip(bounds)
        .map(|(&v, &(lo, hi))| (lo - v).max(v - hi).max(0.0))
        .fold(0.0, f64::max)
}
