//! Notification sinks.
//!
//! Anything that can be handed an [`Event`] is an observer: closures, channel
//! senders, and the stream returned by [`Monitor::watch`](super::Monitor::watch).

use crossbeam_channel::Sender;
use tracing::warn;

use super::events::Event;

/// Receives a notification for every accepted state transition.
///
/// `on_notify` runs on a notification thread, never while the monitor's lock is
/// held. It may read the monitor that notified it. Notifications from distinct
/// transitions can arrive in any order relative to each other.
pub trait Observer: Send + Sync {
    /// Called once per accepted transition, after the monitor lock is released.
    fn on_notify(&self, event: &Event);
}

impl<F> Observer for F
where
    F: Fn(&Event) + Send + Sync,
{
    fn on_notify(&self, event: &Event) {
        self(event);
    }
}

/// Sends each event into the channel. Blocks the notification until the channel
/// accepts it; a disconnected receiver drops the event.
impl Observer for Sender<Event> {
    fn on_notify(&self, event: &Event) {
        if self.send(event.clone()).is_err() {
            warn!(new_state = %event.new_state, "observer channel disconnected; event dropped");
        }
    }
}
