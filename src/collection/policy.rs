//! Aggregation policy: the composite state of a set of member states.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use thiserror::Error;

use crate::error::{CollectionError, ServiceError};
use crate::state::State;

/// Outcome of aggregating member states.
#[derive(Debug, Clone)]
pub(crate) enum Composite {
    Ready,
    Stopped,
    Error(CollectionError),
}

#[derive(Debug, Error)]
#[error("service reported an error without a cause")]
struct MissingCause;

fn missing_cause() -> ServiceError {
    static CAUSE: OnceLock<ServiceError> = OnceLock::new();
    Arc::clone(CAUSE.get_or_init(|| Arc::new(MissingCause)))
}

/// Computes the composite state.
///
/// Returns `None` when there are no members, or when no member is erroring and
/// at least one is still initializing: the composite must not change yet.
pub(crate) fn aggregate<'a, I>(members: I) -> Option<Composite>
where
    I: IntoIterator<Item = (&'a str, State, Option<ServiceError>)>,
{
    let mut seen = false;
    let mut initializing = false;
    let mut all_stopped = true;
    let mut any_stopped = false;
    let mut errors = BTreeMap::new();

    for (label, state, err) in members {
        seen = true;
        match state {
            State::Initializing => {
                initializing = true;
                all_stopped = false;
            }
            State::Ready => all_stopped = false,
            State::Error => {
                errors.insert(label.to_string(), err.unwrap_or_else(missing_cause));
                all_stopped = false;
            }
            State::Stopped => any_stopped = true,
        }
    }

    if !seen {
        return None;
    }
    if !errors.is_empty() {
        return Some(Composite::Error(CollectionError::Members(errors)));
    }
    if initializing {
        return None;
    }
    if all_stopped {
        return Some(Composite::Stopped);
    }
    if any_stopped {
        return Some(Composite::Error(CollectionError::StoppedServices));
    }
    Some(Composite::Ready)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::service_error;

    #[derive(Debug, Error)]
    #[error("{0}")]
    struct Reason(&'static str);

    fn states(list: &[(&'static str, State)]) -> Option<Composite> {
        aggregate(list.iter().map(|&(label, state)| (label, state, None)))
    }

    #[test]
    fn empty_defers() {
        assert!(states(&[]).is_none());
    }

    #[test]
    fn initializing_defers() {
        assert!(states(&[("a", State::Ready), ("b", State::Initializing)]).is_none());
        assert!(states(&[("a", State::Stopped), ("b", State::Initializing)]).is_none());
    }

    #[test]
    fn all_ready() {
        assert!(matches!(
            states(&[("a", State::Ready), ("b", State::Ready)]),
            Some(Composite::Ready)
        ));
    }

    #[test]
    fn all_stopped() {
        assert!(matches!(
            states(&[("a", State::Stopped), ("b", State::Stopped)]),
            Some(Composite::Stopped)
        ));
    }

    #[test]
    fn partial_shutdown() {
        assert!(matches!(
            states(&[("a", State::Stopped), ("b", State::Ready)]),
            Some(Composite::Error(CollectionError::StoppedServices))
        ));
    }

    #[test]
    fn errors_win_over_initializing_and_stopped() {
        let cause = service_error(Reason("refused"));
        let members = vec![
            ("a", State::Initializing, None),
            ("b", State::Error, Some(Arc::clone(&cause))),
            ("c", State::Stopped, None),
        ];
        let Some(Composite::Error(err)) = aggregate(members) else {
            panic!("expected error composite");
        };
        assert_eq!(err.labels(), vec!["b"]);
        assert!(Arc::ptr_eq(err.member("b").unwrap(), &cause));
        assert_eq!(err.to_string(), "b: refused");
    }

    #[test]
    fn error_without_cause_is_reported() {
        let Some(Composite::Error(err)) = states(&[("a", State::Error)]) else {
            panic!("expected error composite");
        };
        assert_eq!(err.to_string(), "a: service reported an error without a cause");

        let Some(Composite::Error(again)) = states(&[("a", State::Error)]) else {
            panic!("expected error composite");
        };
        assert!(err.same_as(&again));
    }
}
