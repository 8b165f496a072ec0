use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicUsize, Ordering},
};

use argmin::core::{CostFunction, Error as ArgminError, Gradient, Hessian};
use curvefit_core::BoxError;

use super::settings::Settings;

/// Why the problem wrapper refused to continue a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Halt {
    Budget,
    Observer,
}

#[derive(Debug)]
struct Best {
    x: Vec<f64>,
    f: f64,
}

/// Counters and the best point, shared by the problem wrapper, the observer
/// relay, and the caller that reads them after the run.
#[derive(Debug)]
pub(super) struct Record {
    evaluations: AtomicUsize,
    gradients: AtomicUsize,
    hessians: AtomicUsize,
    iterations: AtomicUsize,
    best: Mutex<Best>,
    halt: Mutex<Option<Halt>>,
    failure: Mutex<Option<BoxError>>,
}

impl Record {
    pub(super) fn new(x0: &[f64]) -> Self {
        Self {
            evaluations: AtomicUsize::new(0),
            gradients: AtomicUsize::new(0),
            hessians: AtomicUsize::new(0),
            iterations: AtomicUsize::new(0),
            best: Mutex::new(Best {
                x: x0.to_vec(),
                f: f64::INFINITY,
            }),
            halt: Mutex::new(None),
            failure: Mutex::new(None),
        }
    }

    pub(super) fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::Relaxed)
    }

    pub(super) fn gradients(&self) -> usize {
        self.gradients.load(Ordering::Relaxed)
    }

    pub(super) fn hessians(&self) -> usize {
        self.hessians.load(Ordering::Relaxed)
    }

    pub(super) fn iterations(&self) -> usize {
        self.iterations.load(Ordering::Relaxed)
    }

    /// Counts one completed iteration and returns the new total.
    pub(super) fn next_iteration(&self) -> usize {
        self.iterations.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// The best point evaluated so far and its value.
    pub(super) fn best(&self) -> (Vec<f64>, f64) {
        let best = self.best.lock().unwrap_or_else(PoisonError::into_inner);
        (best.x.clone(), best.f)
    }

    fn offer(&self, x: &[f64], f: f64) {
        let mut best = self.best.lock().unwrap_or_else(PoisonError::into_inner);
        if f < best.f {
            best.x.clear();
            best.x.extend_from_slice(x);
            best.f = f;
        }
    }

    /// Records why the run must stop. The first reason wins.
    pub(super) fn halt(&self, reason: Halt) {
        let mut halt = self.halt.lock().unwrap_or_else(PoisonError::into_inner);
        halt.get_or_insert(reason);
    }

    pub(super) fn halted(&self) -> Option<Halt> {
        *self.halt.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fail(&self, error: BoxError) {
        let mut failure = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        failure.get_or_insert(error);
    }

    /// Takes the objective's error, if an evaluation failed.
    pub(super) fn take_failure(&self) -> Option<BoxError> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// The objective as seen by the numerical engine.
///
/// Every evaluated point is first projected into the bounds, and every
/// evaluation is counted against the budget. Derivatives are estimated with
/// finite differences of the projected objective.
pub(super) struct Tracked<'a> {
    objective: &'a dyn Fn(&[f64]) -> Result<f64, BoxError>,
    bounds: Option<&'a [(f64, f64)]>,
    settings: &'a Settings,
    record: Arc<Record>,
}

impl<'a> Tracked<'a> {
    pub(super) fn new(
        objective: &'a dyn Fn(&[f64]) -> Result<f64, BoxError>,
        bounds: Option<&'a [(f64, f64)]>,
        settings: &'a Settings,
        record: Arc<Record>,
    ) -> Self {
        Self {
            objective,
            bounds,
            settings,
            record,
        }
    }

    /// Clamps `x` into the bounds.
    pub(super) fn project(&self, x: &[f64]) -> Vec<f64> {
        match self.bounds {
            Some(bounds) => x
                .iter()
                .zip(bounds)
                .map(|(&v, &(lo, hi))| v.clamp(lo, hi))
                .collect(),
            None => x.to_vec(),
        }
    }

    /// Bounds of coordinate `i`, infinite when unbounded.
    pub(super) fn limits(&self, i: usize) -> (f64, f64) {
        self.bounds
            .map_or((f64::NEG_INFINITY, f64::INFINITY), |bounds| bounds[i])
    }

    /// Evaluates the objective at the projection of `x`.
    ///
    /// # Errors
    ///
    /// Fails once the budget is used up, or when the objective fails. The
    /// reason is kept in the shared [`Record`].
    pub(super) fn evaluate(&self, x: &[f64]) -> Result<f64, ArgminError> {
        if self.record.halted().is_some() {
            return Err(ArgminError::msg("run halted"));
        }
        if self.record.evaluations() >= self.settings.budget {
            self.record.halt(Halt::Budget);
            return Err(ArgminError::msg("evaluation budget exhausted"));
        }

        let x = self.project(x);
        self.record.evaluations.fetch_add(1, Ordering::Relaxed);
        match (self.objective)(&x) {
            Ok(f) => {
                self.record.offer(&x, f);
                Ok(f)
            }
            Err(error) => {
                self.record.fail(error);
                Err(ArgminError::msg("objective evaluation failed"))
            }
        }
    }

    fn central_difference(&self, x: &[f64]) -> Result<Vec<f64>, ArgminError> {
        let mut probe = x.to_vec();
        let mut grad = Vec::with_capacity(x.len());

        for i in 0..x.len() {
            let (lo, hi) = self.limits(i);
            let h = self.settings.step(x[i]);
            let up = (x[i] + h).min(hi);
            let down = (x[i] - h).max(lo);
            if up <= down {
                grad.push(0.0);
                continue;
            }

            probe[i] = up;
            let f_up = self.evaluate(&probe)?;
            probe[i] = down;
            let f_down = self.evaluate(&probe)?;
            probe[i] = x[i];

            let g = (f_up - f_down) / (up - down);
            // Components pushing out of the box are dropped.
            let blocked = (x[i] <= lo && g > 0.0) || (x[i] >= hi && g < 0.0);
            grad.push(if blocked { 0.0 } else { g });
        }

        Ok(grad)
    }
}

impl CostFunction for Tracked<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, x: &Self::Param) -> Result<Self::Output, ArgminError> {
        self.evaluate(x)
    }
}

impl Gradient for Tracked<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, x: &Self::Param) -> Result<Self::Gradient, ArgminError> {
        self.record.gradients.fetch_add(1, Ordering::Relaxed);
        self.central_difference(&self.project(x))
    }
}

impl Hessian for Tracked<'_> {
    type Param = Vec<f64>;
    type Hessian = Vec<Vec<f64>>;

    /// Second-order central differences of the objective.
    fn hessian(&self, x: &Self::Param) -> Result<Self::Hessian, ArgminError> {
        self.record.hessians.fetch_add(1, Ordering::Relaxed);
        let x = self.project(x);
        let n = x.len();
        let steps: Vec<f64> = x
            .iter()
            .map(|v| f64::EPSILON.powf(0.25) * v.abs().max(1.0))
            .collect();

        let center = self.evaluate(&x)?;
        let mut probe = x.clone();
        let mut at = |shifts: &[(usize, f64)]| {
            probe.copy_from_slice(&x);
            for &(i, delta) in shifts {
                probe[i] += delta;
            }
            self.evaluate(&probe)
        };

        let mut hess = vec![vec![0.0; n]; n];
        for i in 0..n {
            let h = steps[i];
            let forward = at(&[(i, h)])?;
            let backward = at(&[(i, -h)])?;
            hess[i][i] = (forward - 2.0 * center + backward) / (h * h);

            for j in 0..i {
                let k = steps[j];
                let pp = at(&[(i, h), (j, k)])?;
                let pm = at(&[(i, h), (j, -k)])?;
                let mp = at(&[(i, -h), (j, k)])?;
                let mm = at(&[(i, -h), (j, -k)])?;
                let value = (pp - pm - mp + mm) / (4.0 * h * k);
                hess[i][j] = value;
                hess[j][i] = value;
            }
        }

        Ok(hess)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use curvefit_core::Options;

    use super::*;
    use crate::minimize::Method;

    fn quadratic(x: &[f64]) -> Result<f64, BoxError> {
        Ok(x[0] * x[0] + 3.0 * x[0] * x[1] + 2.0 * x[1] * x[1])
    }

    fn settings(budget: usize) -> Settings {
        let options = Options::new().with("maxfun", budget);
        Settings::new(Method::Tnc, 2, &options).unwrap()
    }

    #[test]
    fn finite_differences_match_analytic_derivatives() {
        let settings = settings(1000);
        let record = Arc::new(Record::new(&[0.0, 0.0]));
        let problem = Tracked::new(&quadratic, None, &settings, Arc::clone(&record));

        let grad = problem.gradient(&vec![1.0, -1.0]).unwrap();
        assert_relative_eq!(grad[0], 2.0 - 3.0, epsilon = 1e-6);
        assert_relative_eq!(grad[1], 3.0 - 4.0, epsilon = 1e-6);

        let hess = problem.hessian(&vec![1.0, -1.0]).unwrap();
        assert_relative_eq!(hess[0][0], 2.0, epsilon = 1e-4);
        assert_relative_eq!(hess[0][1], 3.0, epsilon = 1e-4);
        assert_relative_eq!(hess[1][0], 3.0, epsilon = 1e-4);
        assert_relative_eq!(hess[1][1], 4.0, epsilon = 1e-4);

        assert_eq!(record.gradients(), 1);
        assert_eq!(record.hessians(), 1);
        assert_eq!(record.evaluations(), 4 + 9);
    }

    #[test]
    fn projects_points_and_blocks_outward_gradients() {
        let settings = settings(1000);
        let bounds = [(0.0, 1.0), (0.0, 1.0)];
        let record = Arc::new(Record::new(&[0.5, 0.5]));
        let sum = |x: &[f64]| Ok::<_, BoxError>(x[0] + x[1]);
        let problem = Tracked::new(&sum, Some(&bounds), &settings, Arc::clone(&record));

        assert_eq!(problem.cost(&vec![-1.0, 2.0]).unwrap(), 1.0);
        assert_eq!(record.best(), (vec![0.0, 1.0], 1.0));

        // At the lower bound the descent direction leaves the box.
        let grad = problem.gradient(&vec![0.0, 0.5]).unwrap();
        assert_eq!(grad[0], 0.0);
        assert_relative_eq!(grad[1], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn budget_and_failures_halt_the_run() {
        let settings = settings(2);
        let record = Arc::new(Record::new(&[0.0, 0.0]));
        let problem = Tracked::new(&quadratic, None, &settings, Arc::clone(&record));

        problem.cost(&vec![1.0, 0.0]).unwrap();
        problem.cost(&vec![0.0, 0.0]).unwrap();
        assert!(problem.cost(&vec![0.5, 0.0]).is_err());
        assert_eq!(record.halted(), Some(Halt::Budget));
        assert_eq!(record.evaluations(), 2);
        assert_eq!(record.best(), (vec![0.0, 0.0], 0.0));

        let failing = |_: &[f64]| Err::<f64, BoxError>("no".into());
        let record = Arc::new(Record::new(&[0.0]));
        let problem = Tracked::new(&failing, None, &settings, Arc::clone(&record));
        assert!(problem.cost(&vec![0.0]).is_err());
        assert_eq!(record.take_failure().unwrap().to_string(), "no");
        assert_eq!(record.halted(), None);
    }
}
