//! Synchronized before-suite setup
//!
//! - `body`: producer/consumer shapes and their normalization
//! - `runner`: executes one phase under a timeout
//! - `compound`: the two-phase orchestrator and its builder
//! - `outcome`: phase outcomes and the reporter summary

pub mod body;
pub mod compound;
pub mod outcome;
pub mod runner;

pub use body::{fail, Argument, ConfigError, Consumer, Done, Producer};
pub use compound::{CompoundSetup, Phase, SetupBuilder, SetupPhase, Terminal, DEFAULT_TIMEOUT};
pub use outcome::{CodeLocation, ComponentType, PhaseFailure, PhaseOutcome, PhaseState, SetupSummary};
pub use runner::{PhaseRunner, TimedRunner};
