//! Notification fan-out.
//!
//! One unit of work per observer, joined before returning. Callers must not hold
//! the monitor's lock while dispatching: a second transition may start its own
//! wave while this one is still being delivered.

use std::sync::Arc;
use std::thread;

use tracing::warn;

use super::events::Event;
use super::observer::Observer;

/// Delivers `event` to every observer and waits for all deliveries to finish.
///
/// A single observer is notified on the calling thread. Otherwise each observer
/// gets its own scoped thread; if a thread cannot be spawned, that observer is
/// notified inline instead.
pub(crate) fn fan_out(thread_name: &str, observers: &[Arc<dyn Observer>], event: &Event) {
    match observers {
        [] => {}
        [only] => only.on_notify(event),
        _ => thread::scope(|scope| {
            for observer in observers {
                let spawned = thread::Builder::new()
                    .name(thread_name.to_string())
                    .spawn_scoped(scope, move || observer.on_notify(event));
                if let Err(err) = spawned {
                    warn!(error = %err, "failed to spawn notification thread; notifying inline");
                    observer.on_notify(event);
                }
            }
        }),
    }
}
