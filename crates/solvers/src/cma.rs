//! Covariance matrix adaptation evolution strategy (CMA-ES).
//!
//! # Algorithm
//!
//! Each generation samples λ candidates from a multivariate normal
//! distribution `N(m, σ² C)`, ranks them by objective value, and moves the
//! mean toward the best μ of them. The covariance `C` learns the shape of the
//! landscape from the successful steps (rank-one and rank-μ updates), and the
//! global step size `σ` follows the length of an evolution path.
//!
//! # When to Use
//!
//! CMA-ES is appropriate when:
//! - The objective is non-convex, noisy, or poorly scaled
//! - Gradients are unavailable
//! - Each evaluation is cheap enough to afford a few thousand of them
//!
//! # Bounds
//!
//! Box bounds are handled by repair: every sample is clamped into the box
//! before it is evaluated, and the ranking adds the squared distance between
//! the raw and the clamped sample. Reported points are always feasible.
//!
//! # Termination
//!
//! A run ends when any criterion in [`Config`] holds, such as `tolfun`, `tolx`,
//! or `tolstagnation`, or when a [`RunLimits`] cap is reached. The criteria
//! that fired are reported in [`Solution::stop`].
//!
//! # Observer Events
//!
//! The strategy emits one [`Event`] per generation. Observers can return
//! [`Action::StopEarly`] to end the run after that generation.

mod action;
mod config;
mod error;
mod event;
mod solution;
mod state;
mod strategy;

#[cfg(test)]
mod tests;

pub use action::Action;
pub use config::{Config, ConfigError, OPTION_KEYS, accepts};
pub use error::Error;
pub use event::Event;
pub use solution::{Solution, Status};
pub use strategy::{CmaEvolutionStrategy, RunLimits};

use curvefit_core::{BoxError, Observer, Options};

/// Minimizes the objective with CMA-ES, starting from `x0` with step size `sigma0`.
///
/// The observer receives an [`Event`] once per generation.
/// See the [module docs](self) for details on termination and observer actions.
///
/// # Errors
///
/// Returns an error if the options or start point are invalid, or if the
/// objective fails during evaluation.
pub fn minimize<F, E, Obs>(
    objective: F,
    x0: &[f64],
    sigma0: f64,
    options: &Options,
    limits: &RunLimits,
    observer: Obs,
) -> Result<Solution, Error>
where
    F: Fn(&[f64]) -> Result<f64, E> + Sync,
    E: Into<BoxError> + Send,
    Obs: for<'a> Observer<Event<'a>, Action>,
{
    let mut strategy = CmaEvolutionStrategy::new(x0, sigma0, options)?;
    Ok(strategy.optimize(objective, limits, observer)?.result())
}

/// Minimizes the objective with CMA-ES without observer support.
///
/// This is a convenience wrapper around [`minimize`] that uses a no-op observer.
///
/// # Errors
///
/// Returns an error if the options or start point are invalid, or if the
/// objective fails during evaluation.
pub fn minimize_unobserved<F, E>(
    objective: F,
    x0: &[f64],
    sigma0: f64,
    options: &Options,
    limits: &RunLimits,
) -> Result<Solution, Error>
where
    F: Fn(&[f64]) -> Result<f64, E> + Sync,
    E: Into<BoxError> + Send,
{
    minimize(objective, x0, sigma0, options, limits, ())
}
