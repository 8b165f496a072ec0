use curvefit_core::BoxError;

/// Errors that can occur during a local search.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown method `{0}`")]
    UnknownMethod(String),

    #[error("start point must not be empty")]
    EmptyStart,

    #[error("bounds have {got} entries, expected {expected}")]
    BoundsLength { got: usize, expected: usize },

    #[error("lower bound exceeds upper bound for parameter {index}")]
    Bounds { index: usize },

    #[error("option `{key}` must be {expected}")]
    InvalidOption { key: String, expected: &'static str },

    #[error("objective error: {0}")]
    Objective(BoxError),

    /// The numerical engine rejected its configuration.
    #[error("solver setup failed: {0}")]
    Setup(#[source] BoxError),
}
