//! Service states and status snapshots.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, UsageError};

/// State of a nested service.
///
/// A service begins in `Initializing`. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    /// The service is not ready yet.
    #[default]
    Initializing,
    /// The service is running normally.
    Ready,
    /// The service is temporarily unavailable.
    Error,
    /// The service is permanently unavailable.
    Stopped,
}

impl State {
    /// Alternative name for [`State::Initializing`].
    pub const NOT_READY: Self = Self::Initializing;

    /// Every defined state, in code order.
    pub const ALL: [Self; 4] = [Self::Initializing, Self::Ready, Self::Error, Self::Stopped];

    /// Stable numeric code of this state.
    #[must_use]
    pub const fn code(self) -> i8 {
        match self {
            Self::Initializing => 0,
            Self::Ready => 1,
            Self::Error => 2,
            Self::Stopped => 3,
        }
    }

    /// Parses a numeric state code, rejecting undefined values.
    pub const fn from_code(code: i8) -> Result<Self, UsageError> {
        match code {
            0 => Ok(Self::Initializing),
            1 => Ok(Self::Ready),
            2 => Ok(Self::Error),
            3 => Ok(Self::Stopped),
            _ => Err(UsageError::UndefinedState { code }),
        }
    }

    /// Lowercase name of this state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Error => "error",
            Self::Stopped => "stopped",
        }
    }

    /// True for the terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl TryFrom<i8> for State {
    type Error = UsageError;

    fn try_from(code: i8) -> Result<Self, UsageError> {
        Self::from_code(code)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serializable point-in-time view of a service, suitable for health reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// Lifecycle state at the time of the snapshot.
    pub state: State,
    /// Rendered text of the most recent error, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Consecutive error transitions. Zero outside the error state.
    #[serde(default)]
    pub err_count: u32,
}

impl Status {
    pub(crate) fn new(state: State, err: Option<&ServiceError>, err_count: u32) -> Self {
        Self {
            state,
            error: err.map(ToString::to_string),
            err_count,
        }
    }

    /// True iff the service is ready.
    #[must_use]
    pub fn is_up(&self) -> bool {
        self.state == State::Ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(State::Ready.to_string(), "ready");
        assert_eq!(State::NOT_READY.to_string(), "initializing");
        assert_eq!(State::Error.to_string(), "error");
        assert_eq!(State::Stopped.to_string(), "stopped");
    }

    #[test]
    fn default_is_initializing() {
        assert_eq!(State::default(), State::Initializing);
        assert_eq!(State::NOT_READY, State::Initializing);
    }

    #[test]
    fn codes_round_trip_and_reject_undefined() {
        for state in State::ALL {
            assert_eq!(State::from_code(state.code()), Ok(state));
        }
        assert_eq!(State::try_from(-1), Err(UsageError::UndefinedState { code: -1 }));
        assert_eq!(State::try_from(4), Err(UsageError::UndefinedState { code: 4 }));
    }

    #[test]
    fn only_stopped_is_terminal() {
        let terminal: Vec<State> = State::ALL.into_iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal, vec![State::Stopped]);
    }

    #[test]
    fn status_serializes_state_as_name() {
        let status = Status {
            state: State::Error,
            error: Some("db down".to_string()),
            err_count: 2,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "error");
        assert_eq!(json["error"], "db down");
        assert_eq!(json["err_count"], 2);

        let ready: Status = serde_json::from_str(r#"{"state":"ready"}"#).unwrap();
        assert!(ready.is_up());
        assert_eq!(ready.error, None);
        assert_eq!(ready.err_count, 0);
    }
}
