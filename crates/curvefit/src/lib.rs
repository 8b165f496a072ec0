//! Fit the parameters of symbolic equations to data.
//!
//! [`CurveFit`] parses an equation, treats every symbol that is not a data
//! column as a parameter, and minimizes the root-mean-square residual against
//! a target with an optimizer chosen by name from the [`registry`].
//!
//! # Optimizers
//!
//! | Identifier           | Adapter                 |
//! |----------------------|-------------------------|
//! | `"PYCMA-CMAES"`      | [`CmaEsOptimizer`]      |
//! | `"Scipy-LBFGSB"`     | [`LbfgsbOptimizer`]     |
//! | `"Scipy-NelderMead"` | [`NelderMeadOptimizer`] |
//! | `"Scipy-Powell"`     | [`PowellOptimizer`]     |
//! | `"Scipy-TNC"`        | [`TncOptimizer`]        |
//!
//! Additional optimizers implement [`BuildOptimizer`](curvefit_core::BuildOptimizer)
//! and are added with [`registry::register_type`].

mod equation;
mod error;
mod fit;
pub mod fitness;
pub mod optimizers;
pub mod registry;

pub use equation::{Data, Equation};
pub use error::{Error, ParameterSpec};
pub use fit::CurveFit;
pub use optimizers::{
    CmaEsOptimizer, CmaOptions, LbfgsbOptimizer, LocalMethod, LocalOptions, LocalSearchOptimizer,
    NelderMeadOptimizer, PowellOptimizer, TncOptimizer,
};

pub use curvefit_core as core;
pub use curvefit_solvers as solvers;
