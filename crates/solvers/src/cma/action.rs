/// Actions an observer can take during an evolution strategy run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Stop after the current generation and report the best point so far.
    StopEarly,
}
