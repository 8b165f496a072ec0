//! Numerical optimization backends.
//!
//! - [`cma`]: covariance matrix adaptation evolution strategy
//! - [`minimize`]: local search (L-BFGS-B, Nelder-Mead, Powell, TNC)
//!
//! Both backends take an objective `Fn(&[f64]) -> Result<f64, E>`, an
//! [`Options`](curvefit_core::Options) map, and an observer that receives one
//! event per iteration and may stop the run early.

pub mod cma;
pub mod minimize;
