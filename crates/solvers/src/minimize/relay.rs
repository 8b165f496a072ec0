use std::sync::{Arc, Mutex, PoisonError};

use argmin::core::{Error as ArgminError, KV, observers::Observe};
use curvefit_core::Observer;

use super::{
    Action, Event,
    problem::{Halt, Record},
};

/// Forwards iterations to the caller's observer.
///
/// The numerical engine owns its observers for the whole run, so the
/// caller's observer is shared behind a mutex. A stop request is turned
/// into an engine error and recorded as [`Halt::Observer`].
pub(super) struct Relay<Obs> {
    observer: Arc<Mutex<Obs>>,
    record: Arc<Record>,
}

impl<Obs> Clone for Relay<Obs> {
    fn clone(&self) -> Self {
        Self {
            observer: Arc::clone(&self.observer),
            record: Arc::clone(&self.record),
        }
    }
}

impl<Obs> Relay<Obs>
where
    Obs: for<'a> Observer<Event<'a>, Action>,
{
    pub(super) fn new(observer: Obs, record: Arc<Record>) -> Self {
        Self {
            observer: Arc::new(Mutex::new(observer)),
            record,
        }
    }

    /// Reports one completed iteration.
    ///
    /// # Errors
    ///
    /// Fails if the observer asked to stop.
    pub(super) fn report(&self) -> Result<(), ArgminError> {
        let iteration = self.record.next_iteration();
        let (x, fun) = self.record.best();
        let event = Event {
            iteration,
            evaluations: self.record.evaluations(),
            x: &x,
            fun,
        };

        let action = self
            .observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .observe(&event);
        if let Some(Action::StopEarly) = action {
            self.record.halt(Halt::Observer);
            return Err(ArgminError::msg("stopped by observer"));
        }
        Ok(())
    }
}

impl<I, Obs> Observe<I> for Relay<Obs>
where
    Obs: for<'a> Observer<Event<'a>, Action>,
{
    fn observe_iter(&mut self, _state: &I, _kv: &KV) -> Result<(), ArgminError> {
        self.report()
    }
}
