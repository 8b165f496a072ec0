/// Actions an observer can take during a local search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Stop after the current iteration and report the best point so far.
    StopEarly,
}
