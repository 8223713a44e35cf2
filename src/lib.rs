//! # nested - health state machines for nested services
//!
//! A nested service runs independently from the process that uses it, but on the
//! same machine and compiled into the same binary. A common use is to wrap an
//! external component (a database connection, a message broker client) and
//! report whether it can currently be used.
//!
//! ## Core Concepts
//!
//! - **State**: `Initializing`, `Ready`, `Error` or `Stopped`. `Stopped` is terminal.
//! - **Monitor**: the state machine. Thread-safe transitions, a sticky error value,
//!   a consecutive-error count, and concurrent fan-out to registered observers.
//! - **Collection**: aggregates many services into one composite state.
//! - **Service**: the capability a collection depends on; implemented by both.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use nested::{Collection, Monitor, State};
//!
//! let db = Arc::new(Monitor::named("db"));
//! let cache = Arc::new(Monitor::named("cache"));
//!
//! let health = Collection::named("app");
//! health.add("db", db.clone());
//! health.add("cache", cache.clone());
//! health.run();
//!
//! db.set_ready();
//! cache.set_ready();
//! assert_eq!(health.state(), State::Ready);
//! ```
//!
//! Usage faults (transitioning a stopped monitor, reusing a collection label,
//! an undefined state code) panic in the plain methods and are returned as
//! [`UsageError`] by the `try_*` variants.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod collection;
pub mod config;
pub mod error;
pub mod monitor;
pub mod service;
pub mod state;

mod sync;

// Re-export primary types at crate root for convenience
pub use collection::Collection;
pub use config::MonitorConfig;
pub use error::{service_error, CollectionError, ServiceError, StreamError, UsageError, UsageResult};
pub use monitor::{Event, EventStream, Monitor, Observer, ObserverId};
pub use service::Service;
pub use state::{State, Status};
