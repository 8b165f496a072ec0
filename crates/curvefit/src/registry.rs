//! The process-wide optimizer registry.
//!
//! It starts with the builtin identifiers and grows through [`register`].
//! Entries are never removed. Tests and embedders that need isolation should
//! build their own [`Registry`] with [`builtin`] and pass it to
//! [`CurveFit::fit_with`](crate::CurveFit::fit_with).

use std::sync::{LazyLock, PoisonError, RwLock};

use curvefit_core::{BuildOptimizer, Error, Implementation, Optimizer, Registry};

use crate::optimizers::{
    CmaEsOptimizer, LbfgsbOptimizer, NelderMeadOptimizer, PowellOptimizer, TncOptimizer,
};

static GLOBAL: LazyLock<RwLock<Registry>> = LazyLock::new(|| RwLock::new(builtin()));

/// A fresh registry holding the builtin optimizers.
#[must_use]
pub fn builtin() -> Registry {
    let mut registry = Registry::new();
    registry.register_type::<CmaEsOptimizer>(CmaEsOptimizer::NAME);
    registry.register_type::<LbfgsbOptimizer>(LbfgsbOptimizer::NAME);
    registry.register_type::<NelderMeadOptimizer>(NelderMeadOptimizer::NAME);
    registry.register_type::<PowellOptimizer>(PowellOptimizer::NAME);
    registry.register_type::<TncOptimizer>(TncOptimizer::NAME);
    registry
}

/// Registers `implementation` under `name`, replacing any previous entry.
pub fn register(name: impl Into<String>, implementation: Implementation) -> Implementation {
    GLOBAL
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .register(name, implementation)
}

/// Registers optimizer type `T` under `name`.
pub fn register_type<T: BuildOptimizer>(name: impl Into<String>) -> Implementation {
    register(name, Implementation::of::<T>())
}

/// Looks up the implementation registered under `name`.
///
/// # Errors
///
/// Returns [`Error::UnknownOptimizer`] if nothing is registered under `name`.
pub fn resolve(name: &str) -> Result<Implementation, Error> {
    GLOBAL
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .resolve(name)
}

/// Finds the first identifier `optimizer`'s type is registered under.
///
/// # Errors
///
/// Returns [`Error::UnregisteredInstance`] if its type is not registered.
pub fn name_of(optimizer: &dyn Optimizer) -> Result<String, Error> {
    GLOBAL
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .name_of(optimizer)
        .map(str::to_owned)
}

/// Registered identifiers in registration order.
#[must_use]
pub fn names() -> Vec<String> {
    GLOBAL
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .names()
        .map(str::to_owned)
        .collect()
}

/// A copy of the current registry.
#[must_use]
pub fn snapshot() -> Registry {
    GLOBAL.read().unwrap_or_else(PoisonError::into_inner).clone()
}

#[cfg(test)]
mod tests {
    use std::{any::Any, convert::Infallible};

    use curvefit_core::{Objective, OptimizeResult, OptimizerBase, Problem};

    use super::*;

    /// Returns the start point unchanged.
    struct Identity {
        base: OptimizerBase,
    }

    impl BuildOptimizer for Identity {
        fn setup(base: OptimizerBase) -> Result<Self, Error> {
            Ok(Self { base })
        }
    }

    impl Optimizer for Identity {
        fn base(&self) -> &OptimizerBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut OptimizerBase {
            &mut self.base
        }

        fn optimize(&mut self) -> Result<OptimizeResult, Error> {
            let x = self.base.x0().to_vec();
            let fun = self.base.objective().call(&x).map_err(Error::Backend)?;
            Ok(OptimizeResult {
                x,
                fun,
                nfev: 1,
                ..OptimizeResult::default()
            })
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn problem() -> Problem {
        Problem::new(
            Objective::new(|x: &[f64]| Ok::<_, Infallible>(x[0])),
            vec![2.0],
        )
    }

    #[test]
    fn builtins_are_registered_in_order() {
        let registry = builtin();
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(
            names,
            [
                "PYCMA-CMAES",
                "Scipy-LBFGSB",
                "Scipy-NelderMead",
                "Scipy-Powell",
                "Scipy-TNC"
            ]
        );
        assert_eq!(
            registry.resolve("Scipy-TNC").unwrap(),
            Implementation::of::<TncOptimizer>()
        );
    }

    #[test]
    fn global_registry_accepts_new_optimizers() {
        let registered = register_type::<Identity>("test-identity");

        assert_eq!(resolve("test-identity").unwrap(), registered);
        assert!(names().iter().any(|name| name == "test-identity"));
        assert!(snapshot().contains("test-identity"));

        let optimizer = registered.build(problem()).unwrap();
        assert_eq!(name_of(optimizer.as_ref()).unwrap(), "test-identity");
        assert_eq!(registered.fmin(problem()).unwrap().fun, 2.0);
    }

    #[test]
    fn unknown_names_and_instances_fail() {
        assert!(matches!(
            resolve("no-such-optimizer"),
            Err(Error::UnknownOptimizer { ref name }) if name == "no-such-optimizer"
        ));

        let optimizer = Identity::build(problem()).unwrap();
        assert!(matches!(
            builtin().name_of(&optimizer),
            Err(Error::UnregisteredInstance { .. })
        ));
    }
}
