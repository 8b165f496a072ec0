use curvefit_core::BoxError;

use super::ConfigError;

/// Errors that can occur during an evolution strategy run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),

    #[error("start point must not be empty")]
    EmptyStart,

    #[error("{what} has {got} entries, expected {expected}")]
    Dimension {
        what: &'static str,
        got: usize,
        expected: usize,
    },

    #[error("initial step size must be finite and positive")]
    StepSize,

    #[error("objective error: {0}")]
    Objective(BoxError),

    #[error("failed to start worker pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
