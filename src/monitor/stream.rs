use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Weak;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};

use crate::error::StreamError;

use super::machine::Shared;
use super::events::{Event, ObserverId};

/// A subscription stream of state transition events.
///
/// Backed by an unbounded channel, so delivery never waits on the reader.
/// Dropping this stream unsubscribes it. Once the monitor stops, the stream
/// yields the remaining events and then reports [`StreamError::Disconnected`].
#[derive(Debug)]
pub struct EventStream {
    id: ObserverId,
    rx: Receiver<Event>,
    monitor: Weak<Shared>,
    unregistered: AtomicBool,
}

impl EventStream {
    pub(crate) fn new(id: ObserverId, rx: Receiver<Event>, monitor: Weak<Shared>) -> Self {
        Self {
            id,
            rx,
            monitor,
            unregistered: AtomicBool::new(false),
        }
    }

    /// The observer id backing this stream.
    #[must_use]
    pub const fn id(&self) -> ObserverId {
        self.id
    }

    /// Explicit unsubscription. Idempotent.
    ///
    /// Events already delivered remain readable.
    pub fn unsubscribe(&self) {
        if self.unregistered.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(shared) = self.monitor.upgrade() {
            shared.remove_observer(self.id);
        }
    }

    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<Event, StreamError> {
        self.rx.recv().map_err(|_| StreamError::Disconnected)
    }

    /// Receive the next event with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Event, StreamError> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => StreamError::Timeout {
                duration_ms: timeout.as_millis().min(u128::from(u64::MAX)) as u64,
            },
            RecvTimeoutError::Disconnected => StreamError::Disconnected,
        })
    }

    /// Receive an event if one is already queued.
    pub fn try_recv(&self) -> Result<Event, StreamError> {
        self.rx.try_recv().map_err(|err| match err {
            TryRecvError::Empty => StreamError::Empty,
            TryRecvError::Disconnected => StreamError::Disconnected,
        })
    }

    /// Drain every queued event without blocking.
    #[must_use]
    pub fn drain(&self) -> Vec<Event> {
        self.rx.try_iter().collect()
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
