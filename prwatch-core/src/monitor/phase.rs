//! Monitor loop phases
//!
//! The loop alternates between polling and sleeping until it is stopped.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Phase of the monitor loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MonitorPhase {
    /// Fetching, filtering and notifying
    #[default]
    Polling,
    /// Waiting for the next cycle
    Sleeping,
    /// Shut down; terminal
    Stopped,
}

impl MonitorPhase {
    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            MonitorPhase::Polling => "Polling for merged pull requests",
            MonitorPhase::Sleeping => "Waiting for next polling cycle",
            MonitorPhase::Stopped => "Stopped",
        }
    }

    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, MonitorPhase::Stopped)
    }

    /// Check if a transition to `to` is legal
    pub fn can_transition_to(&self, to: MonitorPhase) -> bool {
        matches!(
            (self, to),
            (MonitorPhase::Polling, MonitorPhase::Sleeping)
                | (MonitorPhase::Sleeping, MonitorPhase::Polling)
                | (MonitorPhase::Polling, MonitorPhase::Stopped)
                | (MonitorPhase::Sleeping, MonitorPhase::Stopped)
        )
    }
}

impl std::fmt::Display for MonitorPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Current phase plus transition checking
#[derive(Debug, Clone, Default)]
pub struct PhaseTracker {
    current: MonitorPhase,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> MonitorPhase {
        self.current
    }

    /// Attempt to transition to a new phase
    pub fn transition_to(&mut self, phase: MonitorPhase) -> Result<()> {
        if !self.current.can_transition_to(phase) {
            return Err(Error::Other(format!(
                "Invalid transition from {:?} to {:?}",
                self.current, phase
            )));
        }

        tracing::debug!(from = ?self.current, to = ?phase, "Monitor phase transition");

        self.current = phase;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alternates_and_stops() {
        let mut phases = PhaseTracker::new();
        assert_eq!(phases.current(), MonitorPhase::Polling);
        phases.transition_to(MonitorPhase::Sleeping).unwrap();
        phases.transition_to(MonitorPhase::Polling).unwrap();
        phases.transition_to(MonitorPhase::Sleeping).unwrap();
        phases.transition_to(MonitorPhase::Stopped).unwrap();
        assert!(phases.current().is_terminal());
    }

    #[test]
    fn test_stopped_is_terminal() {
        let mut phases = PhaseTracker::new();
        phases.transition_to(MonitorPhase::Stopped).unwrap();
        assert!(phases.transition_to(MonitorPhase::Polling).is_err());
        assert!(phases.transition_to(MonitorPhase::Sleeping).is_err());
    }

    #[test]
    fn test_no_self_transitions() {
        let mut phases = PhaseTracker::new();
        assert!(phases.transition_to(MonitorPhase::Polling).is_err());
        assert!(!MonitorPhase::Sleeping.can_transition_to(MonitorPhase::Sleeping));
    }
}
