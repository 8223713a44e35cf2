//! Observer handles and transition events.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ServiceError;
use crate::state::State;

/// Handle identifying one registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObserverId(Uuid);

impl ObserverId {
    /// Create a new random observer id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A single notification of an accepted state transition.
#[derive(Debug, Clone)]
pub struct Event {
    /// State before the transition.
    pub old_state: State,
    /// State after the transition.
    pub new_state: State,
    /// Error payload of the transition. Always set when `new_state` is `Error`
    /// and the caller supplied one.
    pub error: Option<ServiceError>,
    /// Consecutive error count after the transition.
    pub err_count: u32,
}

impl Event {
    /// True when the transition entered the error state.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.new_state == State::Error
    }

    /// True when the transition stopped the service.
    #[must_use]
    pub fn is_stop(&self) -> bool {
        self.new_state == State::Stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = ObserverId::new();
        let b = ObserverId::new();
        assert_ne!(a, b);
        assert_eq!(ObserverId::from_uuid(*a.as_uuid()), a);
    }

    #[test]
    fn id_serializes_as_bare_uuid() {
        let id = ObserverId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }

    #[test]
    fn event_predicates() {
        let ev = Event {
            old_state: State::Ready,
            new_state: State::Stopped,
            error: None,
            err_count: 0,
        };
        assert!(ev.is_stop());
        assert!(!ev.is_error());
    }
}
