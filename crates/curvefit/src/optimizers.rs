//! Optimizer adapters over the numerical backends.
//!
//! - [`CmaEsOptimizer`] (`"PYCMA-CMAES"`): CMA-ES, a global stochastic search
//! - [`LbfgsbOptimizer`] (`"Scipy-LBFGSB"`), [`NelderMeadOptimizer`]
//!   (`"Scipy-NelderMead"`), [`PowellOptimizer`] (`"Scipy-Powell"`), and
//!   [`TncOptimizer`] (`"Scipy-TNC"`): local searches sharing
//!   [`LocalSearchOptimizer`]
//!
//! Every adapter forwards the user callback once per backend iteration with
//! the best point so far, and stops the run when the callback returns
//! [`Action::StopEarly`](curvefit_core::Action::StopEarly).

mod cma;
mod local;

pub use cma::{CmaEsOptimizer, CmaOptions};
pub use local::{
    LBfgsB, LbfgsbOptimizer, LocalMethod, LocalOptions, LocalSearchOptimizer, NelderMead,
    NelderMeadOptimizer, Powell, PowellOptimizer, Tnc, TncOptimizer,
};

use curvefit_core::{Error, Options};

/// Returns `value`, or an error if `key` is present but `value` could not be read.
fn checked<T>(
    options: &Options,
    key: &str,
    value: Option<T>,
    expected: &'static str,
) -> Result<Option<T>, Error> {
    match value {
        None if options.contains(key) => Err(Error::InvalidOption {
            key: key.to_owned(),
            expected,
        }),
        value => Ok(value),
    }
}
