//! The objective every fit minimizes: the root-mean-square residual between
//! an equation's prediction and the target.
//!
//! [`evaluate`] parses the equation on every call. [`FitnessArgs`] parses it
//! once and is what the driver binds to the optimizer's objective. Both are
//! pure: equal inputs give bit-identical outputs, and nothing is mutated.

use crate::{Data, Equation, Error};

/// Root-mean-square of `predicted - target`.
#[must_use]
pub fn rms(predicted: &[f64], target: &[f64]) -> f64 {
    let squares: f64 = predicted
        .iter()
        .zip(target)
        .map(|(p, t)| (p - t) * (p - t))
        .sum();
    squares.sqrt() / (target.len() as f64).sqrt()
}

/// Fitness of parameter values `x` for `equation` against `target`.
///
/// # Errors
///
/// Returns an error if the equation does not parse, the data does not match
/// the target, or the equation cannot be evaluated at some row.
pub fn evaluate(
    x: &[f64],
    names: &[String],
    data: &Data,
    target: &[f64],
    equation: &str,
) -> Result<f64, Error> {
    check_data(data, target)?;
    let equation = Equation::parse(equation)?;
    let predicted = equation.predict(names, x, data, target.len())?;
    Ok(rms(&predicted, target))
}

/// Everything besides the parameter values that the objective needs.
#[derive(Debug, Clone)]
pub struct FitnessArgs {
    names: Vec<String>,
    data: Data,
    target: Vec<f64>,
    equation: Equation,
}

impl FitnessArgs {
    /// Binds parameter names, data, and target to a parsed equation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyTarget`] or [`Error::DataLength`] if the data
    /// does not line up with the target.
    pub fn new(
        names: Vec<String>,
        data: Data,
        target: Vec<f64>,
        equation: Equation,
    ) -> Result<Self, Error> {
        check_data(&data, &target)?;
        Ok(Self {
            names,
            data,
            target,
            equation,
        })
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn equation(&self) -> &Equation {
        &self.equation
    }
}

/// Fitness of parameter values `x` under `args`.
///
/// # Errors
///
/// Returns an error if the equation cannot be evaluated at some row.
pub fn fitness(x: &[f64], args: &FitnessArgs) -> Result<f64, Error> {
    let predicted = args
        .equation
        .predict(&args.names, x, &args.data, args.target.len())?;
    Ok(rms(&predicted, &args.target))
}

fn check_data(data: &Data, target: &[f64]) -> Result<(), Error> {
    if target.is_empty() {
        return Err(Error::EmptyTarget);
    }
    for (name, column) in data {
        if column.len() != target.len() && column.len() != 1 {
            return Err(Error::DataLength {
                name: name.clone(),
                got: column.len(),
                expected: target.len(),
            });
        }
    }
    Ok(())
}
