/// Emitted once per generation, after the population has been ranked and the
/// distribution updated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event<'a> {
    /// Completed generations.
    pub iteration: usize,

    /// Objective evaluations so far.
    pub evaluations: usize,

    /// Global step size after the update.
    pub sigma: f64,

    /// Distribution mean after the update.
    pub mean: &'a [f64],

    /// Best feasible point evaluated so far.
    pub xbest: &'a [f64],

    /// Objective value at `xbest`.
    pub fbest: f64,
}
