/// Emitted once per completed iteration of a local search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event<'a> {
    /// Completed iterations, starting at 1.
    pub iteration: usize,

    /// Objective evaluations so far, including finite-difference probes.
    pub evaluations: usize,

    /// Best point evaluated so far.
    pub x: &'a [f64],

    /// Objective value at `x`.
    pub fun: f64,
}
