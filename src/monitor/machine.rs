//! The nested service state machine.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crossbeam_channel::unbounded;
use tracing::{debug, trace, warn};

use crate::config::MonitorConfig;
use crate::error::{ServiceError, UsageError, UsageResult};
use crate::service::Service;
use crate::state::{State, Status};
use crate::sync::lock;

use super::dispatcher::fan_out;
use super::events::{Event, ObserverId};
use super::observer::Observer;
use super::stream::EventStream;

/// A basic implementation of the nested service finite state machine.
///
/// A default `Monitor` is ready to use and in the `Initializing` state. A
/// `Monitor` is not `Clone`; share it by reference or behind an `Arc`.
///
/// Every accepted transition notifies all registered observers. The mutating
/// call returns once its own notifications have been delivered, but the lock is
/// released before delivery starts, so notifications from two transitions may
/// interleave.
///
/// The error value is sticky: it is replaced on every transition into `Error`
/// (and whenever a transition carries an error), and kept otherwise, so the
/// last failure stays inspectable after the service recovers or stops.
pub struct Monitor {
    shared: Arc<Shared>,
}

pub(crate) struct Shared {
    config: MonitorConfig,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    state: State,
    err: Option<ServiceError>,
    err_count: u32,
    observers: HashMap<ObserverId, Arc<dyn Observer>>,
}

impl Shared {
    pub(crate) fn remove_observer(&self, id: ObserverId) {
        if lock(&self.inner).observers.remove(&id).is_some() {
            trace!(monitor = %self.config.name, observer = %id, "observer removed");
        }
    }
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("Monitor")
            .field("name", &self.config.name)
            .field("state", &inner.state)
            .field("err", &inner.err)
            .field("err_count", &inner.err_count)
            .field("observers", &inner.observers.len())
            .finish()
    }
}

impl Monitor {
    /// Create an initializing monitor with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MonitorConfig::default())
    }

    /// Create an initializing monitor.
    #[must_use]
    pub fn with_config(config: MonitorConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                inner: Mutex::new(Inner::default()),
            }),
        }
    }

    /// Create an initializing monitor with the given name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::with_config(MonitorConfig::named(name))
    }

    /// Name from the monitor's configuration.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> State {
        lock(&self.shared.inner).state
    }

    /// Most recent error. Persists after the service leaves the error state.
    #[must_use]
    pub fn err(&self) -> Option<ServiceError> {
        lock(&self.shared.inner).err.clone()
    }

    /// Number of consecutive transitions into `Error`. Zero in any other state.
    #[must_use]
    pub fn err_count(&self) -> u32 {
        lock(&self.shared.inner).err_count
    }

    /// Current state and error, read together.
    #[must_use]
    pub fn full_state(&self) -> (State, Option<ServiceError>) {
        let inner = lock(&self.shared.inner);
        (inner.state, inner.err.clone())
    }

    /// Serializable snapshot of the current state.
    #[must_use]
    pub fn status(&self) -> Status {
        let inner = lock(&self.shared.inner);
        Status::new(inner.state, inner.err.as_ref(), inner.err_count)
    }

    /// Number of registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        lock(&self.shared.inner).observers.len()
    }

    /// Sets the state and error, notifying observers of an accepted transition.
    ///
    /// Returns `Ok(false)` when the call changes nothing: the state is already
    /// `new_state` (other than `Error`, where every report counts) and `new_err`
    /// is `None` or the error already recorded.
    ///
    /// # Errors
    ///
    /// [`UsageError::StoppedTransition`] when the monitor is stopped and the
    /// call is not a no-op.
    pub fn try_set_state(&self, new_state: State, new_err: Option<ServiceError>) -> UsageResult<bool> {
        let (event, observers) = {
            let mut inner = lock(&self.shared.inner);

            let same_err = match (&new_err, &inner.err) {
                (None, _) => true,
                (Some(new), Some(old)) => Arc::ptr_eq(new, old),
                (Some(_), None) => false,
            };
            let repeat_error = new_state == State::Error && inner.state != State::Stopped;
            if new_state == inner.state && same_err && !repeat_error {
                trace!(monitor = %self.shared.config.name, state = %new_state, "no-op transition");
                return Ok(false);
            }

            if inner.state == State::Stopped {
                return Err(UsageError::StoppedTransition);
            }

            let err_count = if new_state == State::Error {
                inner.err_count.saturating_add(1)
            } else {
                0
            };

            let event = Event {
                old_state: inner.state,
                new_state,
                error: new_err.clone(),
                err_count,
            };

            inner.state = new_state;
            inner.err_count = err_count;
            if new_state == State::Error || new_err.is_some() {
                inner.err = new_err;
            }

            let observers: Vec<Arc<dyn Observer>> = if new_state == State::Stopped {
                std::mem::take(&mut inner.observers).into_values().collect()
            } else {
                inner.observers.values().cloned().collect()
            };

            (event, observers)
        };

        match &event.error {
            Some(err) if event.is_error() => warn!(
                monitor = %self.shared.config.name,
                from = %event.old_state,
                err_count = event.err_count,
                error = %err,
                "service erroring"
            ),
            _ => debug!(
                monitor = %self.shared.config.name,
                from = %event.old_state,
                to = %event.new_state,
                observers = observers.len(),
                "state transition"
            ),
        }

        fan_out(&self.shared.config.thread_name(), &observers, &event);
        Ok(true)
    }

    /// Sets the state and error.
    ///
    /// # Panics
    ///
    /// On an attempt to change a stopped monitor.
    pub fn set_state(&self, new_state: State, new_err: Option<ServiceError>) {
        if let Err(err) = self.try_set_state(new_state, new_err) {
            panic!("{err}");
        }
    }

    /// Sets the state from its numeric code.
    ///
    /// # Errors
    ///
    /// [`UsageError::UndefinedState`] for an unknown code, whatever the current
    /// state; otherwise as [`Monitor::try_set_state`].
    pub fn try_set_state_code(&self, code: i8, new_err: Option<ServiceError>) -> UsageResult<bool> {
        let state = State::from_code(code)?;
        self.try_set_state(state, new_err)
    }

    /// Sets the state from its numeric code.
    ///
    /// # Panics
    ///
    /// On an undefined code, or on an attempt to change a stopped monitor.
    pub fn set_state_code(&self, code: i8, new_err: Option<ServiceError>) {
        if let Err(err) = self.try_set_state_code(code, new_err) {
            panic!("{err}");
        }
    }

    /// Marks the service ready.
    ///
    /// # Panics
    ///
    /// If the monitor is stopped.
    pub fn set_ready(&self) {
        self.set_state(State::Ready, None);
    }

    /// Marks the service as erroring with `err`.
    ///
    /// # Panics
    ///
    /// If the monitor is stopped.
    pub fn set_error(&self, err: ServiceError) {
        self.set_state(State::Error, Some(err));
    }

    /// Stops the service and releases all observers. Does nothing if already stopped.
    pub fn stop(&self) {
        let _ = self.try_set_state(State::Stopped, None);
    }

    /// Stops the service recording `err` as the reason. Does nothing if already stopped.
    pub fn stop_with(&self, err: ServiceError) {
        let _ = self.try_set_state(State::Stopped, Some(err));
    }

    /// Registers an observer under a fresh id.
    pub fn register<O>(&self, observer: O) -> ObserverId
    where
        O: Observer + 'static,
    {
        let id = ObserverId::new();
        self.subscribe(id, Arc::new(observer));
        id
    }

    /// Registers `observer` under `id`, replacing any observer already using it.
    ///
    /// A stopped monitor never notifies again, so the observer is dropped.
    pub fn subscribe(&self, id: ObserverId, observer: Arc<dyn Observer>) {
        let mut inner = lock(&self.shared.inner);
        if inner.state == State::Stopped {
            trace!(monitor = %self.shared.config.name, observer = %id, "subscribe on stopped monitor ignored");
            return;
        }
        inner.observers.insert(id, observer);
        trace!(monitor = %self.shared.config.name, observer = %id, "observer registered");
    }

    /// Removes an observer. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: ObserverId) {
        self.shared.remove_observer(id);
    }

    /// Alias for [`Monitor::unsubscribe`].
    pub fn deregister(&self, id: ObserverId) {
        self.unsubscribe(id);
    }

    /// Subscribes a new event stream.
    #[must_use]
    pub fn watch(&self) -> EventStream {
        let (tx, rx) = unbounded::<Event>();
        let id = ObserverId::new();
        self.subscribe(id, Arc::new(tx));
        EventStream::new(id, rx, Arc::downgrade(&self.shared))
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.shared, f)
    }
}

impl Service for Monitor {
    fn state(&self) -> State {
        Monitor::state(self)
    }

    fn err(&self) -> Option<ServiceError> {
        Monitor::err(self)
    }

    fn full_state(&self) -> (State, Option<ServiceError>) {
        Monitor::full_state(self)
    }

    fn stop(&self) {
        Monitor::stop(self);
    }

    fn subscribe(&self, id: ObserverId, observer: Arc<dyn Observer>) {
        Monitor::subscribe(self, id, observer);
    }

    fn unsubscribe(&self, id: ObserverId) {
        Monitor::unsubscribe(self, id);
    }
}
