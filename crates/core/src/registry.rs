//! Selecting optimizers by string identifier.
//!
//! A [`Registry`] maps identifiers to [`Implementation`] handles. Lookups by
//! instance match on the optimizer's concrete type, not on object identity,
//! and return the first identifier registered for that type.
//!
//! There is no removal operation. Registering an existing identifier again
//! replaces its implementation in place.

use std::any::{TypeId, type_name};

use crate::{BuildOptimizer, Error, OptimizeResult, Optimizer, Problem};

type Factory = fn(Problem) -> Result<Box<dyn Optimizer>, Error>;

/// A registrable optimizer type: its identity plus a way to build it.
#[derive(Debug, Clone, Copy)]
pub struct Implementation {
    type_id: TypeId,
    type_name: &'static str,
    factory: Factory,
}

impl Implementation {
    /// The implementation for optimizer type `T`.
    #[must_use]
    pub fn of<T: BuildOptimizer>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            factory: |problem| Ok(Box::new(T::build(problem)?)),
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Constructs an optimizer for `problem`.
    ///
    /// # Errors
    ///
    /// Returns any error raised while setting up the optimizer.
    pub fn build(&self, problem: Problem) -> Result<Box<dyn Optimizer>, Error> {
        (self.factory)(problem)
    }

    /// Constructs an optimizer for `problem` and runs it.
    ///
    /// # Errors
    ///
    /// Returns any construction or backend error.
    pub fn fmin(&self, problem: Problem) -> Result<OptimizeResult, Error> {
        self.build(problem)?.optimize()
    }

    /// Whether `optimizer` is an instance of this implementation.
    #[must_use]
    pub fn is_instance(&self, optimizer: &dyn Optimizer) -> bool {
        optimizer.as_any().type_id() == self.type_id
    }
}

impl PartialEq for Implementation {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for Implementation {}

/// Identifier to implementation mapping, in registration order.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Vec<(String, Implementation)>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `implementation` under `name`, replacing any previous entry.
    ///
    /// Returns the implementation so registration can be chained or stored.
    pub fn register(&mut self, name: impl Into<String>, implementation: Implementation) -> Implementation {
        let name = name.into();
        log::debug!("registering optimizer `{name}` as {}", implementation.type_name);

        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = implementation,
            None => self.entries.push((name, implementation)),
        }
        implementation
    }

    /// Registers optimizer type `T` under `name`.
    pub fn register_type<T: BuildOptimizer>(&mut self, name: impl Into<String>) -> Implementation {
        self.register(name, Implementation::of::<T>())
    }

    /// Looks up the implementation registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownOptimizer`] if nothing is registered under `name`.
    pub fn resolve(&self, name: &str) -> Result<Implementation, Error> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, implementation)| *implementation)
            .ok_or_else(|| Error::UnknownOptimizer {
                name: name.to_owned(),
            })
    }

    /// Finds the first identifier whose implementation `optimizer` belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnregisteredInstance`] if no entry matches.
    pub fn name_of(&self, optimizer: &dyn Optimizer) -> Result<&str, Error> {
        self.entries
            .iter()
            .find(|(_, implementation)| implementation.is_instance(optimizer))
            .map(|(name, _)| name.as_str())
            .ok_or_else(|| Error::UnregisteredInstance {
                type_name: optimizer.type_name(),
            })
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Registered identifiers in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
