//! The nested service capability.

use std::sync::Arc;

use crate::error::ServiceError;
use crate::monitor::{Observer, ObserverId};
use crate::state::State;

/// Behavior shared by every nested service.
///
/// A [`Collection`](crate::collection::Collection) depends only on this trait,
/// so any type implementing it can be aggregated. Mutating transitions are
/// deliberately absent: only the code implementing a service changes its state.
pub trait Service: Send + Sync {
    /// Current state of the service.
    fn state(&self) -> State;

    /// Most recent error. `None` if the service has never reported one.
    fn err(&self) -> Option<ServiceError>;

    /// Current state and error, read together.
    fn full_state(&self) -> (State, Option<ServiceError>) {
        (self.state(), self.err())
    }

    /// Stops the service and releases its resources. Returns once shutdown is
    /// complete. Safe to call repeatedly.
    fn stop(&self);

    /// Registers `observer` under `id`, replacing any observer with the same id.
    fn subscribe(&self, id: ObserverId, observer: Arc<dyn Observer>);

    /// Removes the observer registered under `id`, if any.
    fn unsubscribe(&self, id: ObserverId);
}
