/// Receives optimizer progress and decides whether the run should continue.
///
/// Observers are how callers watch or steer a backend without changing its
/// API: logging progress, recording a trace, or stopping once a result is good
/// enough.
///
/// The `observe` method returns `Option<A>`. `Some(action)` requests a
/// backend-specific action and `None` lets the run continue unchanged.
///
/// Closures implement `Observer` automatically, and `()` is a no-op observer.
pub trait Observer<E, A> {
    /// Observes one event and optionally returns a control action.
    fn observe(&mut self, event: &E) -> Option<A>;
}

impl<E, A, F> Observer<E, A> for F
where
    F: FnMut(&E) -> Option<A>,
{
    fn observe(&mut self, event: &E) -> Option<A> {
        self(event)
    }
}

impl<E, A> Observer<E, A> for () {
    fn observe(&mut self, _event: &E) -> Option<A> {
        None
    }
}

/// Progress report passed to a user callback once per optimizer iteration.
///
/// `x` and `fun` describe the best point found so far. What counts as one
/// iteration is up to the backend: a generation for an evolution strategy,
/// an outer step for a local search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Iteration<'a> {
    /// Completed iterations, starting at 1.
    pub iteration: usize,

    /// Objective evaluations so far.
    pub evaluations: usize,

    /// Best parameter vector so far.
    pub x: &'a [f64],

    /// Objective value at `x`.
    pub fun: f64,
}

/// Actions a user callback can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Abort the run and report the best point found so far.
    StopEarly,
}

/// A boxed user callback, as stored by an optimizer.
pub type Callback = Box<dyn for<'a> Observer<Iteration<'a>, Action> + Send>;
