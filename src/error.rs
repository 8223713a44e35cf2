//! Error types for nested services.
//!
//! Two categories are kept apart:
//! - [`UsageError`] describes a programming fault at the call site (transitioning a
//!   stopped service, reusing a collection label, naming an undefined state). The
//!   `try_*` entry points return it; the plain entry points panic with its message.
//! - [`CollectionError`] is an ordinary domain error published by a [`Collection`]
//!   as its own error value. It is inspected, never fatal.
//!
//! [`Collection`]: crate::collection::Collection

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Error value carried by a service in the `Error` state.
///
/// Errors are compared by identity (`Arc::ptr_eq`), never by message.
pub type ServiceError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Wraps any error into a [`ServiceError`].
pub fn service_error<E>(err: E) -> ServiceError
where
    E: std::error::Error + Send + Sync + 'static,
{
    Arc::new(err)
}

/// Programming faults. These are not expected at runtime.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("cannot transition from stopped state")]
    StoppedTransition,

    #[error("add: label {label:?} already in use")]
    DuplicateLabel {
        label: String,
    },

    #[error("state {code} is undefined")]
    UndefinedState {
        code: i8,
    },
}

/// Result type alias for operations that can fail with a usage fault.
pub type UsageResult<T> = Result<T, UsageError>;

/// Composite error published by a collection.
#[derive(Clone, Error)]
pub enum CollectionError {
    /// One or more members are erroring. Keyed by member label.
    #[error("{}", render_members(.0))]
    Members(BTreeMap<String, ServiceError>),

    /// No member is erroring, but some (not all) members are stopped.
    ///
    /// Normally seen while a collection is being torn down.
    #[error("there are stopped services")]
    StoppedServices,
}

impl CollectionError {
    /// Recovers a `CollectionError` from the error value published by a collection.
    #[must_use]
    pub fn from_service_error(err: &ServiceError) -> Option<&Self> {
        err.downcast_ref::<Self>()
    }

    /// Labels of the erroring members, in sorted order.
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        match self {
            Self::Members(errors) => errors.keys().map(String::as_str).collect(),
            Self::StoppedServices => Vec::new(),
        }
    }

    /// Returns the error reported by the member with `label`, if it is erroring.
    #[must_use]
    pub fn member(&self, label: &str) -> Option<&ServiceError> {
        match self {
            Self::Members(errors) => errors.get(label),
            Self::StoppedServices => None,
        }
    }

    /// True when both values describe the same members failing with the same errors.
    pub(crate) fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::StoppedServices, Self::StoppedServices) => true,
            (Self::Members(a), Self::Members(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|((la, ea), (lb, eb))| la == lb && Arc::ptr_eq(ea, eb))
            }
            _ => false,
        }
    }
}

impl fmt::Debug for CollectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Members(errors) => f
                .debug_map()
                .entries(errors.iter().map(|(label, err)| (label, err.to_string())))
                .finish(),
            Self::StoppedServices => f.write_str("StoppedServices"),
        }
    }
}

fn render_members(errors: &BTreeMap<String, ServiceError>) -> String {
    let mut msgs: Vec<String> = errors.iter().map(|(label, err)| format!("{label}: {err}")).collect();
    msgs.sort();
    msgs.join("\n")
}

/// Errors returned when reading from an [`EventStream`](crate::monitor::EventStream).
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("no event received after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },

    #[error("event stream is disconnected")]
    Disconnected,

    #[error("no event available")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("{0}")]
    struct Plain(&'static str);

    #[test]
    fn usage_error_messages() {
        assert_eq!(UsageError::StoppedTransition.to_string(), "cannot transition from stopped state");
        let err = UsageError::DuplicateLabel {
            label: "service 0".to_string(),
        };
        assert_eq!(err.to_string(), r#"add: label "service 0" already in use"#);
        assert_eq!(UsageError::UndefinedState { code: -1 }.to_string(), "state -1 is undefined");
    }

    #[test]
    fn members_render_sorted_one_per_line() {
        let mut errors = BTreeMap::new();
        errors.insert("zeta".to_string(), service_error(Plain("down")));
        errors.insert("alpha".to_string(), service_error(Plain("timeout")));
        let err = CollectionError::Members(errors);
        assert_eq!(err.to_string(), "alpha: timeout\nzeta: down");
        assert_eq!(err.labels(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn stopped_services_message() {
        assert_eq!(CollectionError::StoppedServices.to_string(), "there are stopped services");
        assert!(CollectionError::StoppedServices.labels().is_empty());
    }

    #[test]
    fn same_as_compares_error_identity() {
        let down = service_error(Plain("down"));
        let mut a = BTreeMap::new();
        a.insert("db".to_string(), Arc::clone(&down));
        let mut b = BTreeMap::new();
        b.insert("db".to_string(), Arc::clone(&down));
        let mut c = BTreeMap::new();
        c.insert("db".to_string(), service_error(Plain("down")));

        let a = CollectionError::Members(a);
        assert!(a.same_as(&CollectionError::Members(b)));
        assert!(!a.same_as(&CollectionError::Members(c)));
        assert!(!a.same_as(&CollectionError::StoppedServices));
        assert!(CollectionError::StoppedServices.same_as(&CollectionError::StoppedServices));
    }

    #[test]
    fn downcast_from_service_error() {
        let published: ServiceError = Arc::new(CollectionError::StoppedServices);
        let recovered = CollectionError::from_service_error(&published).unwrap();
        assert!(matches!(recovered, CollectionError::StoppedServices));

        let other = service_error(Plain("x"));
        assert!(CollectionError::from_service_error(&other).is_none());
    }
}
