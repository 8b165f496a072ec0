//! Powell's conjugate direction-set method.
//!
//! Each iteration minimizes along every direction in turn, then replaces the
//! direction of largest decrease with the net displacement when that is
//! expected to help. Line minimization uses Brent's method on a bracket, or
//! on the feasible segment when the problem is bounded.

use argmin::{
    core::{CostFunction, Error as ArgminError, Executor, State},
    solver::brent::BrentOpt,
};
use curvefit_core::Observer;

use super::{Action, Event, problem::Tracked, relay::Relay, settings::Settings};

const GROW: f64 = 1.618_034;
const MAX_EXPANSIONS: usize = 50;
const LINE_ITERS: u64 = 500;
const ABS_TOL: f64 = 1e-11;

/// How the direction-set loop ended, when it ended on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Exit {
    Converged,
    IterationLimit,
}

/// The objective restricted to the line `origin + t * direction`.
struct Line<'p, 'a> {
    problem: &'p Tracked<'a>,
    origin: &'p [f64],
    direction: &'p [f64],
}

impl Line<'_, '_> {
    /// Values of `t` that keep the point inside the bounds.
    fn span(&self) -> (f64, f64) {
        let mut span = (f64::NEG_INFINITY, f64::INFINITY);
        for (i, (&x, &d)) in self.origin.iter().zip(self.direction).enumerate() {
            if d == 0.0 {
                continue;
            }
            let (lo, hi) = self.problem.limits(i);
            let (a, b) = ((lo - x) / d, (hi - x) / d);
            span.0 = span.0.max(a.min(b));
            span.1 = span.1.min(a.max(b));
        }
        span
    }
}

impl CostFunction for Line<'_, '_> {
    type Param = f64;
    type Output = f64;

    fn cost(&self, t: &f64) -> Result<f64, ArgminError> {
        self.problem.evaluate(&along(self.origin, self.direction, *t))
    }
}

fn along(origin: &[f64], direction: &[f64], t: f64) -> Vec<f64> {
    origin.iter().zip(direction).map(|(x, d)| x + t * d).collect()
}

/// Expands a downhill bracket from `t = 0` until the objective rises.
fn bracket(line: &Line<'_, '_>, f0: f64, (lo, hi): (f64, f64)) -> Result<(f64, f64), ArgminError> {
    let mut b = 1.0_f64.min(hi);
    if b <= 0.0 {
        b = (-1.0_f64).max(lo);
    }
    if b == 0.0 {
        return Ok((0.0, 0.0));
    }

    let mut a = 0.0;
    let mut fb = line.cost(&b)?;
    if fb > f0 {
        (a, b) = (b, a);
        fb = f0;
    }

    let mut c = (b + GROW * (b - a)).clamp(lo, hi);
    let mut fc = line.cost(&c)?;
    for _ in 0..MAX_EXPANSIONS {
        if fc >= fb || c == b {
            break;
        }
        (a, b, fb) = (b, c, fc);
        c = (b + GROW * (b - a)).clamp(lo, hi);
        fc = line.cost(&c)?;
    }

    Ok((a.min(c), a.max(c)))
}

/// Minimizes along `direction` from `x`.
///
/// Returns the new value, the new point, and the step taken. The point is
/// left unchanged when no improvement on `fx` is found.
fn line_search(
    problem: &Tracked<'_>,
    x: &[f64],
    fx: f64,
    direction: &[f64],
    tol: f64,
) -> Result<(f64, Vec<f64>, Vec<f64>), ArgminError> {
    let unchanged = || (fx, x.to_vec(), vec![0.0; x.len()]);
    if direction.iter().all(|d| *d == 0.0) {
        return Ok(unchanged());
    }

    let line = Line {
        problem,
        origin: x,
        direction,
    };
    let span = line.span();
    let (a, b) = if span.0.is_finite() && span.1.is_finite() {
        span
    } else {
        bracket(&line, fx, span)?
    };
    if b <= a {
        return Ok(unchanged());
    }

    // `tol` is relative to the step; the absolute floor only matters near `t = 0`.
    let solver = BrentOpt::new(a, b).set_tolerance(tol.max(f64::EPSILON.sqrt()), ABS_TOL);
    let result = Executor::new(line, solver)
        .configure(|state| state.max_iters(LINE_ITERS))
        .run()?;
    let state = result.state();
    let t = state.get_best_param().copied().unwrap_or(0.0);
    let ft = state.get_best_cost();

    if ft < fx {
        let step: Vec<f64> = direction.iter().map(|d| t * d).collect();
        Ok((ft, along(x, direction, t), step))
    } else {
        Ok(unchanged())
    }
}

/// Runs the direction-set loop from `x0`.
///
/// # Errors
///
/// Fails when the problem wrapper halts the run or a line search fails.
pub(super) fn run<Obs>(
    problem: &Tracked<'_>,
    x0: &[f64],
    settings: &Settings,
    relay: &Relay<Obs>,
) -> Result<Exit, ArgminError>
where
    Obs: for<'a> Observer<Event<'a>, Action>,
{
    let n = x0.len();
    let mut directions = settings.direc.clone().unwrap_or_else(|| {
        (0..n)
            .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
            .collect()
    });
    let tol = settings.xtol * 100.0;

    let mut x = problem.project(x0);
    let mut fval = problem.evaluate(&x)?;
    let mut previous = x.clone();
    let mut iterations = 0;

    loop {
        let fx = fval;
        let mut biggest = 0;
        let mut delta = 0.0;
        for (i, direction) in directions.iter().enumerate() {
            let before = fval;
            (fval, x, _) = line_search(problem, &x, fval, direction, tol)?;
            if before - fval > delta {
                delta = before - fval;
                biggest = i;
            }
        }

        iterations += 1;
        relay.report()?;

        let bound = settings.ftol * (fx.abs() + fval.abs()) + 1e-20;
        if 2.0 * (fx - fval) <= bound {
            return Ok(Exit::Converged);
        }
        if iterations >= settings.maxiter {
            return Ok(Exit::IterationLimit);
        }

        let displacement: Vec<f64> = x.iter().zip(&previous).map(|(a, b)| a - b).collect();
        let extrapolated: Vec<f64> = x.iter().zip(&previous).map(|(a, b)| 2.0 * a - b).collect();
        previous.clone_from(&x);
        let fx2 = problem.evaluate(&extrapolated)?;

        if fx > fx2 {
            let mut t = 2.0 * (fx + fx2 - 2.0 * fval);
            let temp = fx - fval - delta;
            t *= temp * temp;
            let temp = fx - fx2;
            t -= delta * temp * temp;
            if t < 0.0 {
                let (f, next, step) = line_search(problem, &x, fval, &displacement, tol)?;
                (fval, x) = (f, next);
                if step.iter().any(|s| *s != 0.0) {
                    let last = directions.len() - 1;
                    directions[biggest] = directions[last].clone();
                    directions[last] = step;
                }
            }
        }
    }
}
