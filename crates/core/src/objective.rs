use std::{fmt, sync::Arc};

use crate::BoxError;

/// A scalar objective over a parameter vector.
///
/// Cloning is cheap and the handle can be called from several threads at
/// once, which lets a backend evaluate a whole population in parallel.
/// Objectives must not rely on shared mutable state.
#[derive(Clone)]
pub struct Objective(Arc<dyn Fn(&[f64]) -> Result<f64, BoxError> + Send + Sync>);

impl Objective {
    /// Wraps a function of the parameter vector.
    pub fn new<F, E>(f: F) -> Self
    where
        F: Fn(&[f64]) -> Result<f64, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Self(Arc::new(move |x| f(x).map_err(Into::into)))
    }

    /// Wraps a function that takes extra arguments, binding `args` to every call.
    pub fn with_args<F, A, E>(f: F, args: A) -> Self
    where
        F: Fn(&[f64], &A) -> Result<f64, E> + Send + Sync + 'static,
        A: Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Self::new(move |x: &[f64]| f(x, &args))
    }

    /// Evaluates the objective at `x`.
    ///
    /// # Errors
    ///
    /// Returns whatever error the wrapped function produced.
    pub fn call(&self, x: &[f64]) -> Result<f64, BoxError> {
        (self.0)(x)
    }
}

impl fmt::Debug for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Objective(..)")
    }
}
