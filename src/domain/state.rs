use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of an autonomous schedule entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScheduleState {
    /// Waiting for its launch slot
    Scheduled,
    /// Prediction claimed in the ledger and handed to the caller
    Launched,
    /// Resolved by a matching feed event
    Verified,
    /// Resolved as failure after the grace window closed
    Expired,
    /// Launch slot found the target already claimed by the feed
    Skipped,
}

impl ScheduleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleState::Scheduled => "SCHEDULED",
            ScheduleState::Launched => "LAUNCHED",
            ScheduleState::Verified => "VERIFIED",
            ScheduleState::Expired => "EXPIRED",
            ScheduleState::Skipped => "SKIPPED",
        }
    }

    /// Check if this state can transition to another state
    pub fn can_transition_to(&self, target: ScheduleState) -> bool {
        use ScheduleState::*;

        matches!(
            (self, target),
            (Scheduled, Launched) | (Scheduled, Skipped) | (Launched, Verified) | (Launched, Expired)
        )
    }

    /// Get valid next states from current state
    pub fn valid_transitions(&self) -> Vec<ScheduleState> {
        use ScheduleState::*;

        match self {
            Scheduled => vec![Launched, Skipped],
            Launched => vec![Verified, Expired],
            Verified | Expired | Skipped => vec![],
        }
    }

    /// Still counts toward the scheduler's pipeline
    pub fn is_open(&self) -> bool {
        matches!(self, ScheduleState::Scheduled | ScheduleState::Launched)
    }
}

impl fmt::Display for ScheduleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for ScheduleState {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_uppercase().as_str() {
            "SCHEDULED" => Ok(ScheduleState::Scheduled),
            "LAUNCHED" => Ok(ScheduleState::Launched),
            "VERIFIED" => Ok(ScheduleState::Verified),
            "EXPIRED" => Ok(ScheduleState::Expired),
            "SKIPPED" => Ok(ScheduleState::Skipped),
            _ => Err(format!("Unknown state: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        use ScheduleState::*;

        assert!(Scheduled.can_transition_to(Launched));
        assert!(Launched.can_transition_to(Expired));
        assert!(!Scheduled.can_transition_to(Verified));
        assert!(!Verified.can_transition_to(Launched));

        for state in [Scheduled, Launched, Verified, Expired, Skipped] {
            for next in state.valid_transitions() {
                assert!(state.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_round_trip_names() {
        for state in [
            ScheduleState::Scheduled,
            ScheduleState::Launched,
            ScheduleState::Verified,
            ScheduleState::Expired,
            ScheduleState::Skipped,
        ] {
            assert_eq!(ScheduleState::try_from(state.as_str()), Ok(state));
        }
        assert!(ScheduleState::try_from("bogus").is_err());
    }
}
