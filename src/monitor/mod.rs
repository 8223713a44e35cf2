//! The nested service state machine and its notification plumbing.
//!
//! A [`Monitor`] owns one state, one sticky error and a registry of observers.
//! Transitions are applied under the monitor's lock; observers are notified
//! afterwards, concurrently, without the lock held.

/// Monitor state machine.
pub mod machine;
/// Concurrent notification fan-out.
mod dispatcher;
/// Observer ids and events.
pub mod events;
/// Notification sinks.
pub mod observer;
/// Subscriber stream handle.
pub mod stream;

pub use machine::Monitor;
pub use events::{Event, ObserverId};
pub use observer::Observer;
pub use stream::EventStream;
