//! Core types for fitting equations through pluggable optimizers.
//!
//! This crate defines the pieces every optimizer adapter and caller share:
//!
//! - [`Options`]: a mergeable key/value configuration map
//! - [`OptimizeResult`]: the normalized result of a run, persistable as
//!   JSON, TOML, YAML, or binary through [`Persist`]
//! - [`Objective`]: a thread-safe scalar objective over a parameter vector
//! - [`Optimizer`], [`BuildOptimizer`]: the adapter contract
//! - [`Registry`]: selection of optimizers by string identifier
//! - [`Observer`]: per-iteration callbacks that can stop a run early

mod error;
mod objective;
mod observer;
pub mod optimizer;
pub mod options;
mod persist;
pub mod registry;
mod result;

pub use error::{BoxError, Error, FormatError};
pub use objective::Objective;
pub use observer::{Action, Callback, Iteration, Observer};
pub use optimizer::{BuildOptimizer, Bounds, Optimizer, OptimizerBase, Problem};
pub use options::{Options, Value};
pub use persist::{Format, Persist};
pub use registry::{Implementation, Registry};
pub use result::{NamedValues, OptimizeResult};
