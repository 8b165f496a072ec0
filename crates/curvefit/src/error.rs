use std::fmt;

use evalexpr::EvalexprError;

/// Which per-parameter mapping a fit was missing an entry in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterSpec {
    Initial,
    Bound,
    Spread,
}

impl fmt::Display for ParameterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Initial => "initial value",
            Self::Bound => "bound",
            Self::Spread => "spread",
        })
    }
}

/// Errors raised while fitting an equation to data.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to parse equation `{equation}`")]
    Parse {
        equation: String,
        #[source]
        source: EvalexprError,
    },

    /// A parameter of the equation has no initial value, bound, or spread.
    #[error("parameter `{name}` has no {spec}")]
    MissingParameterSpec { name: String, spec: ParameterSpec },

    #[error("data column `{name}` has {got} rows, expected {expected}")]
    DataLength {
        name: String,
        got: usize,
        expected: usize,
    },

    #[error("target must not be empty")]
    EmptyTarget,

    #[error("got {got} parameter values for {expected} parameter names")]
    ParameterCount { got: usize, expected: usize },

    #[error("failed to evaluate equation at row {row}")]
    Evaluation {
        row: usize,
        #[source]
        source: EvalexprError,
    },

    #[error(transparent)]
    Optimizer(#[from] curvefit_core::Error),
}
