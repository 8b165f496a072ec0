/// Why a local search ended.
///
/// The numeric codes are stable and are reported as [`Solution::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The method's convergence test passed.
    Converged,

    /// The evaluation budget was used up.
    EvaluationLimit,

    /// The iteration limit was reached.
    IterationLimit,

    /// Stopped early due to an observer decision.
    StoppedByObserver,

    /// The method stopped for another reason, such as a failed line search.
    Abnormal,
}

impl Status {
    #[must_use]
    pub fn code(self) -> i64 {
        match self {
            Self::Converged => 0,
            Self::EvaluationLimit => 1,
            Self::IterationLimit => 2,
            Self::StoppedByObserver => 3,
            Self::Abnormal => 4,
        }
    }

    fn message(self) -> &'static str {
        match self {
            Self::Converged => "Optimization terminated successfully.",
            Self::EvaluationLimit => "Maximum number of function evaluations has been exceeded.",
            Self::IterationLimit => "Maximum number of iterations has been exceeded.",
            Self::StoppedByObserver => "Stopped by the callback.",
            Self::Abnormal => "Abnormal termination.",
        }
    }
}

/// The outcome of a local search.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// Best point evaluated.
    pub x: Vec<f64>,

    /// Objective value at `x`.
    pub fun: f64,

    pub success: bool,

    /// Numeric form of [`Solution::reason`].
    pub status: i64,

    pub reason: Status,

    /// Human-readable description of the exit.
    pub message: String,

    /// Objective evaluations, including finite-difference probes.
    pub nfev: usize,

    /// Gradient evaluations, for methods that use gradients.
    pub njev: Option<usize>,

    /// Hessian evaluations, for methods that use Hessians.
    pub nhev: Option<usize>,

    /// Completed iterations.
    pub nit: usize,

    /// Last gradient, for methods that use gradients.
    pub jac: Option<Vec<f64>>,

    /// Last Hessian, for methods that use Hessians.
    pub hess: Option<Vec<Vec<f64>>>,

    /// Largest bound violation at `x`, for bounded runs.
    pub maxcv: Option<f64>,
}

impl Solution {
    pub(super) fn new(reason: Status, detail: Option<String>, x: Vec<f64>, fun: f64) -> Self {
        let message = match detail {
            Some(detail) => format!("{} {detail}", reason.message()),
            None => reason.message().to_owned(),
        };
        Self {
            x,
            fun,
            success: reason == Status::Converged,
            status: reason.code(),
            reason,
            message,
            nfev: 0,
            njev: None,
            nhev: None,
            nit: 0,
            jac: None,
            hess: None,
            maxcv: None,
        }
    }
}
