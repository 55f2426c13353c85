//! Test outcomes and the faults that produce them

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result classification of a test node or lifecycle phase.
///
/// Outcomes combine under a dominance rule: `Failed` dominates
/// everything, and `Inconclusive` dominates `Passed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed,
    Inconclusive,
}

impl Outcome {
    /// Combine two outcomes, keeping the dominant one
    pub fn combine(self, other: Outcome) -> Outcome {
        use Outcome::*;
        match (self, other) {
            (Failed, _) | (_, Failed) => Failed,
            (Inconclusive, _) | (_, Inconclusive) => Inconclusive,
            (Passed, Passed) => Passed,
        }
    }

    /// Check if this outcome allows later phases to proceed
    pub fn is_passed(&self) -> bool {
        matches!(self, Outcome::Passed)
    }

    /// Check if this outcome marks a failure
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed)
    }

    /// The log channel that faults with this mapped outcome are written to
    pub fn log_channel(&self) -> LogChannel {
        match self {
            Outcome::Failed => LogChannel::Failure,
            Outcome::Inconclusive => LogChannel::Warning,
            Outcome::Passed => LogChannel::Default,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Outcome::Passed => "passed",
            Outcome::Failed => "failed",
            Outcome::Inconclusive => "inconclusive",
        };
        write!(f, "{}", text)
    }
}

/// Channel a log entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogChannel {
    Failure,
    Warning,
    Default,
}

/// Classification of a fault raised by a lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// An assertion made by the test did not hold
    Assertion,
    /// The phase hit an unexpected error
    Error,
    /// The test declared itself not runnable
    Ignored,
    /// The test declared its verdict undecided
    Pending,
}

/// A failure raised by a lifecycle phase.
///
/// Faults never escape the execution controller; they are mapped to an
/// [`Outcome`] and logged on the channel that outcome selects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// An assertion fault
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Assertion, message)
    }

    /// An unexpected-error fault
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Error, message)
    }

    /// The outcome this fault maps to
    pub fn outcome(&self) -> Outcome {
        match self.kind {
            FaultKind::Assertion | FaultKind::Error => Outcome::Failed,
            FaultKind::Ignored | FaultKind::Pending => Outcome::Inconclusive,
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}
