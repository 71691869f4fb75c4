/// Session phase definitions for tracking run progress
///
/// This module defines all phases a session can be in and which moves
/// between them are legal.
use std::fmt;

/// Represents the current phase of a harvesting session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    /// Session created, no run started yet
    Idle,

    /// Feed scanner and dispatcher are running
    Scanning,

    /// No new tasks are produced; outstanding workers are awaited
    Draining,

    /// Run finished and reconciled; a new run may start
    Terminated,
}

impl SessionPhase {
    /// Returns true while a run is in progress
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Scanning | Self::Draining)
    }

    /// Returns true if a new run may start from this phase
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Idle | Self::Terminated)
    }

    /// Returns true if moving from this phase to `next` is legal
    ///
    /// Idle → Scanning → Draining → Terminated, and Terminated → Scanning
    /// for the next run sharing the same feed source.
    pub fn can_transition_to(&self, next: SessionPhase) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Scanning)
                | (Self::Scanning, Self::Draining)
                | (Self::Draining, Self::Terminated)
                | (Self::Terminated, Self::Scanning)
        )
    }

    /// Short lowercase name, used in logs and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Draining => "draining",
            Self::Terminated => "terminated",
        }
    }

    /// Returns all possible phases
    pub fn all_phases() -> Vec<Self> {
        vec![Self::Idle, Self::Scanning, Self::Draining, Self::Terminated]
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
