use std::collections::BTreeMap;

/// Why an evolution strategy run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// A termination criterion fired; see [`Solution::stop`].
    Terminated,

    /// Reached the run's iteration limit.
    IterationLimit,

    /// Reached the run's evaluation limit.
    EvaluationLimit,

    /// Stopped early due to an observer decision.
    StoppedByObserver,
}

/// The outcome of an evolution strategy run.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub status: Status,

    /// Best feasible point evaluated.
    pub xbest: Vec<f64>,

    /// Objective value at `xbest`.
    pub fbest: f64,

    /// Evaluation count at which `xbest` was found.
    pub evals_best: usize,

    /// Total objective evaluations.
    pub evaluations: usize,

    /// Completed generations.
    pub iterations: usize,

    /// Final per-dimension standard deviations, `sigma * sqrt(diag(C))`.
    pub stds: Vec<f64>,

    /// Final global step size.
    pub sigma: f64,

    /// Final distribution mean.
    pub mean: Vec<f64>,

    /// Criteria that ended the run, mapped to their thresholds.
    pub stop: BTreeMap<String, f64>,
}
