use std::{collections::BTreeMap, collections::VecDeque, time::Instant};

use curvefit_core::{BoxError, Observer, Options};
use nalgebra::DVector;
use rand::{SeedableRng, rngs::StdRng};
use rayon::{ThreadPool, ThreadPoolBuilder, prelude::*};

use super::{Action, Config, ConfigError, Error, Event, Solution, Status, state::State};

/// Limits and settings for one call to [`CmaEvolutionStrategy::optimize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLimits {
    /// Generations to run in this call, at most.
    pub iterations: Option<usize>,

    /// Total evaluations allowed, counted from the strategy's creation.
    pub maxfun: Option<usize>,

    /// Generations to run before any termination criterion may end the call.
    pub min_iterations: usize,

    /// Log progress every this many generations; overrides the config.
    pub verb_disp: Option<usize>,

    /// Worker threads for objective evaluation; `1` evaluates inline.
    pub n_jobs: usize,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            iterations: None,
            maxfun: None,
            min_iterations: 1,
            verb_disp: None,
            n_jobs: 1,
        }
    }
}

#[derive(Debug, Clone)]
struct Best {
    x: Vec<f64>,
    f: f64,
    evaluation: usize,
}

/// A (μ/μ_w, λ) covariance matrix adaptation evolution strategy.
///
/// Drive it with [`optimize`](Self::optimize), or step it manually with
/// [`ask`](Self::ask) and [`tell`](Self::tell).
pub struct CmaEvolutionStrategy {
    config: Config,
    state: State,
    bounds: Option<(Vec<f64>, Vec<f64>)>,
    rng: StdRng,
    pending: Vec<(DVector<f64>, Vec<f64>)>,
    evaluations: usize,
    iterations: usize,
    best: Best,
    maxiter: usize,
    tolstagnation: usize,
    history_len: usize,
    history: VecDeque<f64>,
    stagnation: VecDeque<f64>,
    current_range: f64,
    flat_generations: usize,
    started: Instant,
    stop: BTreeMap<String, f64>,
    status: Status,
}

impl CmaEvolutionStrategy {
    /// Creates a strategy at `x0` with global step size `sigma0`.
    ///
    /// # Errors
    ///
    /// Returns an error if `options` holds keys the strategy does not accept,
    /// or if the start point, step size, spreads, or bounds are invalid.
    pub fn new(x0: &[f64], sigma0: f64, options: &Options) -> Result<Self, Error> {
        Self::with_config(x0, sigma0, Config::from_options(options)?)
    }

    /// Creates a strategy from an already validated config.
    ///
    /// # Errors
    ///
    /// Returns an error if the start point, step size, spreads, or bounds
    /// do not fit the problem dimension.
    pub fn with_config(x0: &[f64], sigma0: f64, config: Config) -> Result<Self, Error> {
        if x0.is_empty() {
            return Err(Error::EmptyStart);
        }
        if !sigma0.is_finite() || sigma0 <= 0.0 {
            return Err(Error::StepSize);
        }

        let dim = x0.len();
        let stds = match config.stds() {
            Some(stds) => broadcast("CMA_stds", stds, dim)?,
            None => vec![1.0; dim],
        };
        if stds.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(ConfigError::InvalidValue {
                key: "CMA_stds".into(),
                expected: "finite and positive",
            }
            .into());
        }
        let bounds = match config.bounds() {
            Some((lower, upper)) => Some((
                broadcast("lower bounds", lower, dim)?,
                broadcast("upper bounds", upper, dim)?,
            )),
            None => None,
        };

        #[allow(clippy::cast_precision_loss)]
        let n = dim as f64;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let lambda = config
            .popsize()
            .unwrap_or_else(|| 4 + (3.0 * n.ln()).floor() as usize);
        #[allow(clippy::cast_precision_loss)]
        let lambda_f = lambda as f64;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let maxiter = config
            .maxiter()
            .unwrap_or_else(|| (100.0 + 150.0 * (n + 3.0).powi(2) / lambda_f.sqrt()) as usize);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let tolstagnation = config
            .tolstagnation()
            .unwrap_or_else(|| (100.0 + 100.0 * n.powf(1.5) / lambda_f) as usize);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let history_len = 10 + (30.0 * n / lambda_f).ceil() as usize;

        let rng = match config.seed() {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let start = repair(x0, bounds.as_ref());
        Ok(Self {
            state: State::new(x0, sigma0, &stds, lambda),
            config,
            bounds,
            rng,
            pending: Vec::new(),
            evaluations: 0,
            iterations: 0,
            best: Best {
                x: start,
                f: f64::INFINITY,
                evaluation: 0,
            },
            maxiter,
            tolstagnation,
            history_len,
            history: VecDeque::with_capacity(history_len),
            stagnation: VecDeque::with_capacity(tolstagnation),
            current_range: f64::INFINITY,
            flat_generations: 0,
            started: Instant::now(),
            stop: BTreeMap::new(),
            status: Status::Terminated,
        })
    }

    /// Population size, λ.
    #[must_use]
    pub fn popsize(&self) -> usize {
        self.state.lambda()
    }

    #[must_use]
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    #[must_use]
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    #[must_use]
    pub fn sigma(&self) -> f64 {
        self.state.sigma
    }

    /// Samples a new population and returns the points to evaluate.
    ///
    /// Returned points always lie inside the bounds. Calling `ask` again
    /// before [`tell`](Self::tell) discards the previous population.
    pub fn ask(&mut self) -> Vec<Vec<f64>> {
        self.pending = self
            .state
            .sample(&mut self.rng)
            .into_iter()
            .map(|raw| {
                let feasible = repair(raw.as_slice(), self.bounds.as_ref());
                (raw, feasible)
            })
            .collect();
        self.pending.iter().map(|(_, x)| x.clone()).collect()
    }

    /// Ranks the last population by `values` and updates the distribution.
    ///
    /// `values[k]` is the objective at the `k`-th point returned by
    /// [`ask`](Self::ask). Samples that fell outside the bounds are ranked
    /// with an added squared-distance penalty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Dimension`] if `values` does not match the population.
    pub fn tell(&mut self, values: &[f64]) -> Result<(), Error> {
        if values.len() != self.pending.len() || values.is_empty() {
            return Err(Error::Dimension {
                what: "objective values",
                got: values.len(),
                expected: self.pending.len(),
            });
        }
        let population = std::mem::take(&mut self.pending);

        let ranking: Vec<f64> = population
            .iter()
            .zip(values)
            .map(|((raw, feasible), &f)| {
                let f = if f.is_nan() { f64::INFINITY } else { f };
                let penalty: f64 = raw
                    .iter()
                    .zip(feasible)
                    .map(|(r, x)| (r - x).powi(2))
                    .sum();
                f + penalty
            })
            .collect();

        for (k, ((_, feasible), &f)) in population.iter().zip(values).enumerate() {
            if f < self.best.f {
                self.best = Best {
                    x: feasible.clone(),
                    f,
                    evaluation: self.evaluations + k + 1,
                };
            }
        }
        self.evaluations += values.len();
        self.iterations += 1;

        let mut order: Vec<usize> = (0..ranking.len()).collect();
        order.sort_by(|&a, &b| ranking[a].total_cmp(&ranking[b]));

        let first = ranking[order[0]];
        let last = ranking[order[order.len() - 1]];
        self.current_range = last - first;

        if first == ranking[order[order.len() / 2]] {
            self.flat_generations += 1;
            let factor = (0.2 + self.state.c_sigma() / self.state.d_sigma()).exp();
            log::warn!(
                "flat fitness in generation {}, increasing step size by {factor:.3}",
                self.iterations
            );
            self.state.inflate_sigma(factor);
        } else {
            self.flat_generations = 0;
        }

        push_capped(&mut self.history, first, self.history_len);
        let generation_best = order
            .iter()
            .map(|&k| values[k])
            .find(|f| !f.is_nan())
            .unwrap_or(f64::INFINITY);
        push_capped(&mut self.stagnation, generation_best, self.tolstagnation);

        let raw: Vec<DVector<f64>> = population.into_iter().map(|(raw, _)| raw).collect();
        self.state.update(&raw, &order);
        Ok(())
    }

    /// Evaluates the termination criteria for the current state.
    ///
    /// Returns each criterion that holds, mapped to its threshold. The map is
    /// empty while the run should continue.
    #[must_use]
    pub fn check_termination(&self) -> BTreeMap<String, f64> {
        let mut stop = BTreeMap::new();
        let config = &self.config;
        let sigma = self.state.sigma;
        let (max_axis, min_axis) = self.state.axis_range();

        if self.best.f <= config.ftarget() {
            stop.insert("ftarget".to_owned(), config.ftarget());
        }
        if self.evaluations >= config.maxfevals() {
            stop.insert("maxfevals".to_owned(), as_threshold(config.maxfevals()));
        }
        if self.iterations >= self.maxiter {
            stop.insert("maxiter".to_owned(), as_threshold(self.maxiter));
        }
        if let Some(timeout) = config.timeout() {
            if self.started.elapsed() >= timeout {
                stop.insert("timeout".to_owned(), timeout.as_secs_f64());
            }
        }

        let history_range = range(self.history.iter().copied());
        if self.iterations > 1
            && self.current_range < config.tolfun()
            && history_range < config.tolfun()
        {
            stop.insert("tolfun".to_owned(), config.tolfun());
        }
        if self.history.len() == self.history_len && history_range < config.tolfunhist() {
            stop.insert("tolfunhist".to_owned(), config.tolfunhist());
        }

        let max_std = self.state.stds().into_iter().fold(0.0, f64::max);
        let max_path = self.state.p_c.amax();
        if self.iterations > 0 && max_std < config.tolx() && sigma * max_path < config.tolx() {
            stop.insert("tolx".to_owned(), config.tolx());
        }
        if sigma / self.state.sigma0 > config.tolupsigma() * max_axis {
            stop.insert("tolupsigma".to_owned(), config.tolupsigma());
        }
        if self.state.degenerate || (max_axis / min_axis).powi(2) > config.tolconditioncov() {
            stop.insert("tolconditioncov".to_owned(), config.tolconditioncov());
        }
        if self.tolstagnation > 0 && self.stagnation.len() == self.tolstagnation {
            let window: Vec<f64> = self.stagnation.iter().copied().collect();
            let tail = (window.len() / 5).max(1);
            if median(&window[window.len() - tail..]) >= median(&window[..tail]) {
                stop.insert("tolstagnation".to_owned(), as_threshold(self.tolstagnation));
            }
        }
        if config.tolflatfitness() > 0 && self.flat_generations >= config.tolflatfitness() {
            stop.insert("tolflatfitness".to_owned(), as_threshold(config.tolflatfitness()));
        }

        stop
    }

    /// Runs generations until a criterion fires or a run limit is reached.
    ///
    /// The observer sees one [`Event`] per generation and can stop the run
    /// with [`Action::StopEarly`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Objective`] with the objective's own error if any
    /// evaluation fails, or [`Error::ThreadPool`] if worker threads cannot be
    /// started.
    pub fn optimize<F, E, Obs>(
        &mut self,
        objective: F,
        limits: &RunLimits,
        mut observer: Obs,
    ) -> Result<&mut Self, Error>
    where
        F: Fn(&[f64]) -> Result<f64, E> + Sync,
        E: Into<BoxError> + Send,
        Obs: for<'a> Observer<Event<'a>, Action>,
    {
        let pool = if limits.n_jobs > 1 {
            Some(ThreadPoolBuilder::new().num_threads(limits.n_jobs).build()?)
        } else {
            None
        };
        let verb_disp = if self.config.verbose() < 0 {
            0
        } else {
            limits.verb_disp.unwrap_or(self.config.verb_disp())
        };
        let iterations = limits.iterations.unwrap_or(usize::MAX);
        let maxfun = limits.maxfun.unwrap_or(usize::MAX);
        let first = self.iterations;
        self.stop.clear();

        loop {
            let ran = self.iterations - first;
            if ran >= iterations {
                self.finish(Status::IterationLimit, "maxiter", as_threshold(iterations));
                break;
            }
            if self.evaluations >= maxfun {
                self.finish(Status::EvaluationLimit, "maxfevals", as_threshold(maxfun));
                break;
            }

            let candidates = self.ask();
            let values = evaluate(&objective, &candidates, pool.as_ref())?;
            self.tell(&values)?;

            if verb_disp > 0 && (self.iterations == 1 || self.iterations % verb_disp == 0) {
                self.disp();
            }

            let event = Event {
                iteration: self.iterations,
                evaluations: self.evaluations,
                sigma: self.state.sigma,
                mean: self.state.mean.as_slice(),
                xbest: &self.best.x,
                fbest: self.best.f,
            };
            if let Some(Action::StopEarly) = observer.observe(&event) {
                self.finish(Status::StoppedByObserver, "callback", 1.0);
                break;
            }

            let stop = self.check_termination();
            if !stop.is_empty() && ran + 1 >= limits.min_iterations {
                self.stop = stop;
                self.status = Status::Terminated;
                break;
            }
        }

        if verb_disp > 0 {
            self.disp();
        }
        Ok(self)
    }

    /// The best point found and the final distribution.
    #[must_use]
    pub fn result(&self) -> Solution {
        Solution {
            status: self.status,
            xbest: self.best.x.clone(),
            fbest: self.best.f,
            evals_best: self.best.evaluation,
            evaluations: self.evaluations,
            iterations: self.iterations,
            stds: self.state.stds(),
            sigma: self.state.sigma,
            mean: self.state.mean.as_slice().to_vec(),
            stop: self.stop.clone(),
        }
    }

    /// Logs one progress line.
    pub fn disp(&self) {
        let (max_axis, min_axis) = self.state.axis_range();
        log::info!(
            "cma-es iter {:>5} evals {:>7} fbest {:>14.7e} sigma {:>9.2e} axis ratio {:>9.2e}",
            self.iterations,
            self.evaluations,
            self.best.f,
            self.state.sigma,
            max_axis / min_axis,
        );
    }

    fn finish(&mut self, status: Status, key: &str, threshold: f64) {
        self.status = status;
        self.stop.insert(key.to_owned(), threshold);
    }
}

fn evaluate<F, E>(
    objective: &F,
    candidates: &[Vec<f64>],
    pool: Option<&ThreadPool>,
) -> Result<Vec<f64>, Error>
where
    F: Fn(&[f64]) -> Result<f64, E> + Sync,
    E: Into<BoxError> + Send,
{
    let eval = |x: &Vec<f64>| objective(x).map_err(|e| Error::Objective(e.into()));
    match pool {
        Some(pool) => pool.install(|| candidates.par_iter().map(eval).collect()),
        None => candidates.iter().map(eval).collect(),
    }
}

fn repair(x: &[f64], bounds: Option<&(Vec<f64>, Vec<f64>)>) -> Vec<f64> {
    match bounds {
        Some((lower, upper)) => x
            .iter()
            .zip(lower.iter().zip(upper))
            .map(|(&v, (&lo, &hi))| v.clamp(lo, hi))
            .collect(),
        None => x.to_vec(),
    }
}

fn broadcast(what: &'static str, values: &[f64], dim: usize) -> Result<Vec<f64>, Error> {
    match values.len() {
        1 => Ok(vec![values[0]; dim]),
        len if len == dim => Ok(values.to_vec()),
        got => Err(Error::Dimension {
            what,
            got,
            expected: dim,
        }),
    }
}

fn push_capped(history: &mut VecDeque<f64>, value: f64, cap: usize) {
    if cap == 0 {
        return;
    }
    if history.len() == cap {
        history.pop_front();
    }
    history.push_back(value);
}

fn range(values: impl Iterator<Item = f64>) -> f64 {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if lo > hi { f64::INFINITY } else { hi - lo }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        0.5 * (sorted[mid - 1] + sorted[mid])
    } else {
        sorted[mid]
    }
}

#[allow(clippy::cast_precision_loss)]
fn as_threshold(count: usize) -> f64 {
    if count == usize::MAX {
        f64::INFINITY
    } else {
        count as f64
    }
}
