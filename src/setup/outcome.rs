//! Phase outcomes and the setup summary

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Source location of a registered setup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeLocation {
    pub file: String,
    pub line: u32,
}

impl CodeLocation {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Location of the caller
    #[track_caller]
    pub fn caller() -> Self {
        let location = std::panic::Location::caller();
        Self::new(location.file(), location.line())
    }
}

impl fmt::Display for CodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Kind of suite component a phase belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    BeforeSuite,
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentType::BeforeSuite => write!(f, "BeforeSuite"),
        }
    }
}

/// Final state of a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseState {
    Passed,
    Failed,
    Panicked,
    TimedOut,
}

impl PhaseState {
    pub fn is_passed(self) -> bool {
        self == PhaseState::Passed
    }
}

impl fmt::Display for PhaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseState::Passed => write!(f, "passed"),
            PhaseState::Failed => write!(f, "failed"),
            PhaseState::Panicked => write!(f, "panicked"),
            PhaseState::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Details of a failed phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseFailure {
    pub message: String,
    /// Where the failure was raised
    pub location: CodeLocation,
    /// Rendered panic value, for unexpected panics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forwarded_panic: Option<String>,
    pub component_type: ComponentType,
    pub component_index: usize,
    /// Where the failing component was registered
    pub component_location: CodeLocation,
}

/// Outcome of running one phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseOutcome {
    pub state: PhaseState,
    pub failure: Option<PhaseFailure>,
}

impl PhaseOutcome {
    pub fn passed() -> Self {
        Self {
            state: PhaseState::Passed,
            failure: None,
        }
    }

    pub fn failed(state: PhaseState, failure: PhaseFailure) -> Self {
        Self {
            state,
            failure: Some(failure),
        }
    }

    pub fn is_passed(&self) -> bool {
        self.state.is_passed()
    }
}

/// Everything a phase runner needs to know besides the body
#[derive(Debug, Clone)]
pub struct PhaseContext {
    pub location: CodeLocation,
    pub component_type: ComponentType,
    pub component_index: usize,
    pub timeout: Duration,
}

impl PhaseContext {
    /// Failure record attributed to this phase
    pub fn failure(&self, message: impl Into<String>) -> PhaseFailure {
        PhaseFailure {
            message: message.into(),
            location: self.location.clone(),
            forwarded_panic: None,
            component_type: self.component_type,
            component_index: self.component_index,
            component_location: self.location.clone(),
        }
    }
}

/// Reporter-facing record of a synchronized setup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupSummary {
    pub component_type: ComponentType,
    pub code_location: CodeLocation,
    /// `None` until the setup has run
    pub state: Option<PhaseState>,
    /// Wall time from entry to exit, including the wait on followers
    #[serde(with = "duration_nanos")]
    pub run_time: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<PhaseFailure>,
}

impl SetupSummary {
    pub fn passed(&self) -> bool {
        self.state.is_some_and(PhaseState::is_passed)
    }
}

mod duration_nanos {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(d.as_nanos() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_nanos(u64::deserialize(deserializer)?))
    }
}
