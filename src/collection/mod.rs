//! Aggregation of many services into one composite status.
//!
//! The composite state of a [`Collection`] is:
//! - `Error` if ANY member is erroring (the error lists every erroring member);
//! - `Initializing` while ANY member is initializing and none are erroring;
//! - `Stopped` if ALL members are stopped;
//! - `Error` ([`CollectionError::StoppedServices`]) if some, but not all, are stopped;
//! - `Ready` otherwise.

mod policy;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use std::thread;

use tracing::{debug, info, trace};

use crate::config::MonitorConfig;
use crate::error::{CollectionError, ServiceError, UsageError, UsageResult};
use crate::monitor::{Event, EventStream, Monitor, Observer, ObserverId};
use crate::service::Service;
use crate::state::{State, Status};
use crate::sync::lock;

use self::policy::{aggregate, Composite};

/// Monitors multiple services and keeps track of their overall state.
///
/// Services are added with [`Collection::add`] and cannot be removed. The
/// composite state only starts tracking members once [`Collection::run`] has
/// been called. A default `Collection` is ready to use and initializing.
///
/// Observers of a collection must not drive member transitions from inside
/// `on_notify`: the aggregation that notified them is still in progress.
/// Calling [`Collection::stop`] from an observer is allowed.
pub struct Collection {
    shared: Arc<Shared>,
}

struct Shared {
    monitor: Monitor,
    /// Used when subscribing to members, so repeated subscriptions replace each other.
    id: ObserverId,
    members: Mutex<Members>,
    /// Serializes recomputation. Holds the last published aggregate error.
    published: Mutex<Option<CollectionError>>,
}

#[derive(Default)]
struct Members {
    services: BTreeMap<String, Arc<dyn Service>>,
    running: bool,
    /// Set by [`Collection::stop`] before the composite monitor is stopped.
    stopped: bool,
}

/// Member-side observer feeding the collection's aggregation.
struct Aggregator {
    collection: Weak<Shared>,
}

impl Observer for Aggregator {
    fn on_notify(&self, _event: &Event) {
        if let Some(shared) = self.collection.upgrade() {
            shared.recompute();
        }
    }
}

impl Shared {
    fn aggregator(self: &Arc<Self>) -> Arc<dyn Observer> {
        Arc::new(Aggregator {
            collection: Arc::downgrade(self),
        })
    }

    fn snapshot(&self) -> Vec<(String, Arc<dyn Service>)> {
        lock(&self.members)
            .services
            .iter()
            .map(|(label, service)| (label.clone(), Arc::clone(service)))
            .collect()
    }

    fn recompute(&self) {
        let mut published = lock(&self.published);

        if self.monitor.state() == State::Stopped {
            trace!(collection = %self.monitor.name(), "aggregation after stop ignored");
            return;
        }

        let members: Vec<(String, State, Option<ServiceError>)> = self
            .snapshot()
            .into_iter()
            .map(|(label, service)| {
                let (state, err) = service.full_state();
                (label, state, err)
            })
            .collect();

        let Some(composite) = aggregate(members.iter().map(|(label, state, err)| (label.as_str(), *state, err.clone())))
        else {
            return;
        };

        let committed = match composite {
            Composite::Ready => {
                *published = None;
                self.monitor.try_set_state(State::Ready, None)
            }
            Composite::Stopped => {
                *published = None;
                self.monitor.try_set_state(State::Stopped, None)
            }
            Composite::Error(err) => {
                let unchanged = published.as_ref().is_some_and(|last| last.same_as(&err));
                if unchanged && self.monitor.state() == State::Error {
                    return;
                }
                *published = Some(err.clone());
                self.monitor.try_set_state(State::Error, Some(Arc::new(err)))
            }
        };

        if let Err(err) = committed {
            debug!(collection = %self.monitor.name(), error = %err, "composite update dropped");
        }
    }
}

impl Collection {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MonitorConfig::named("collection"))
    }

    /// Create an empty collection whose composite monitor uses `config`.
    #[must_use]
    pub fn with_config(config: MonitorConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                monitor: Monitor::with_config(config),
                id: ObserverId::new(),
                members: Mutex::new(Members::default()),
                published: Mutex::new(None),
            }),
        }
    }

    /// Create an empty collection with the given name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::with_config(MonitorConfig::named(name))
    }

    /// Name of the composite monitor.
    #[must_use]
    pub fn name(&self) -> &str {
        self.shared.monitor.name()
    }

    /// Adds a service to be monitored.
    ///
    /// If the collection is already running, the service is aggregated
    /// immediately; otherwise from the next call to [`Collection::run`].
    ///
    /// # Errors
    ///
    /// [`UsageError::DuplicateLabel`] if `label` is already in use.
    pub fn try_add(&self, label: impl Into<String>, service: Arc<dyn Service>) -> UsageResult<()> {
        let label = label.into();
        let running = {
            let mut members = lock(&self.shared.members);
            if members.services.contains_key(&label) {
                return Err(UsageError::DuplicateLabel { label });
            }
            members.services.insert(label.clone(), Arc::clone(&service));
            if members.running {
                service.subscribe(self.shared.id, self.shared.aggregator());
            }
            members.running
        };

        debug!(collection = %self.name(), service = %label, running, "service added");
        if running {
            self.shared.recompute();
        }
        Ok(())
    }

    /// Adds a service to be monitored.
    ///
    /// # Panics
    ///
    /// If `label` is already in use.
    pub fn add(&self, label: impl Into<String>, service: Arc<dyn Service>) {
        if let Err(err) = self.try_add(label, service) {
            panic!("{err}");
        }
    }

    /// Starts aggregating member states, then computes the composite once.
    ///
    /// Calling `run` on a running or stopped collection has no further effect.
    pub fn run(&self) {
        {
            let mut members = lock(&self.shared.members);
            if members.stopped || self.shared.monitor.state() == State::Stopped {
                return;
            }
            members.running = true;
            for service in members.services.values() {
                service.subscribe(self.shared.id, self.shared.aggregator());
            }
            info!(collection = %self.name(), services = members.services.len(), "collection running");
        }
        self.shared.recompute();
    }

    /// Stops the collection and every member.
    ///
    /// Members are detached first, then stopped concurrently; the composite is
    /// `Stopped` on return.
    pub fn stop(&self) {
        let services: Vec<Arc<dyn Service>> = {
            let mut members = lock(&self.shared.members);
            members.running = false;
            members.stopped = true;
            for service in members.services.values() {
                service.unsubscribe(self.shared.id);
            }
            members.services.values().cloned().collect()
        };

        info!(collection = %self.name(), services = services.len(), "stopping collection");
        thread::scope(|scope| {
            for service in &services {
                scope.spawn(move || service.stop());
            }
        });

        self.shared.monitor.stop();
    }

    /// Labels of every member, mapped to whether that member is ready.
    #[must_use]
    pub fn up(&self) -> BTreeMap<String, bool> {
        let members = lock(&self.shared.members);
        members
            .services
            .iter()
            .map(|(label, service)| (label.clone(), service.state() == State::Ready))
            .collect()
    }

    /// Number of members currently in `state`.
    #[must_use]
    pub fn state_count(&self, state: State) -> usize {
        let members = lock(&self.shared.members);
        members.services.values().filter(|service| service.state() == state).count()
    }

    /// True iff the composite state is `Ready`.
    #[must_use]
    pub fn is_up(&self) -> bool {
        self.shared.monitor.state() == State::Ready
    }

    /// True once [`Collection::run`] has been called and until [`Collection::stop`].
    #[must_use]
    pub fn is_running(&self) -> bool {
        lock(&self.shared.members).running
    }

    /// Member labels in sorted order.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        lock(&self.shared.members).services.keys().cloned().collect()
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.shared.members).services.len()
    }

    /// True when no service has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Status of every member.
    ///
    /// Error counts are not part of the [`Service`] capability and are reported as zero.
    #[must_use]
    pub fn statuses(&self) -> BTreeMap<String, Status> {
        self.shared
            .snapshot()
            .into_iter()
            .map(|(label, service)| {
                let (state, err) = service.full_state();
                let status = Status::new(state, err.as_ref(), 0);
                (label, status)
            })
            .collect()
    }

    /// Composite state.
    #[must_use]
    pub fn state(&self) -> State {
        self.shared.monitor.state()
    }

    /// Most recent composite error.
    #[must_use]
    pub fn err(&self) -> Option<ServiceError> {
        self.shared.monitor.err()
    }

    /// Most recent composite error as a [`CollectionError`].
    #[must_use]
    pub fn collection_error(&self) -> Option<CollectionError> {
        let err = self.err()?;
        CollectionError::from_service_error(&err).cloned()
    }

    /// Consecutive composite error transitions.
    #[must_use]
    pub fn err_count(&self) -> u32 {
        self.shared.monitor.err_count()
    }

    /// Composite state and error read atomically.
    #[must_use]
    pub fn full_state(&self) -> (State, Option<ServiceError>) {
        self.shared.monitor.full_state()
    }

    /// Snapshot of the composite status.
    #[must_use]
    pub fn status(&self) -> Status {
        self.shared.monitor.status()
    }

    /// Registers an observer of the composite state under a fresh id.
    pub fn register<O>(&self, observer: O) -> ObserverId
    where
        O: Observer + 'static,
    {
        self.shared.monitor.register(observer)
    }

    /// Removes a composite observer. Unknown ids are ignored.
    pub fn deregister(&self, id: ObserverId) {
        self.shared.monitor.deregister(id);
    }

    /// Subscribes a new stream of composite transitions.
    #[must_use]
    pub fn watch(&self) -> EventStream {
        self.shared.monitor.watch()
    }
}

impl Default for Collection {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Collection {
    fn drop(&mut self) {
        let members = lock(&self.shared.members);
        for service in members.services.values() {
            service.unsubscribe(self.shared.id);
        }
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("monitor", &self.shared.monitor)
            .field("labels", &self.labels())
            .field("running", &self.is_running())
            .finish()
    }
}

impl Service for Collection {
    fn state(&self) -> State {
        Collection::state(self)
    }

    fn err(&self) -> Option<ServiceError> {
        Collection::err(self)
    }

    fn full_state(&self) -> (State, Option<ServiceError>) {
        Collection::full_state(self)
    }

    fn stop(&self) {
        Collection::stop(self);
    }

    fn subscribe(&self, id: ObserverId, observer: Arc<dyn Observer>) {
        self.shared.monitor.subscribe(id, observer);
    }

    fn unsubscribe(&self, id: ObserverId) {
        self.shared.monitor.unsubscribe(id);
    }
}
