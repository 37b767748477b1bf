//! syncsuite - synchronized before-suite setup for parallel test fleets
//!
//! A fleet of N test processes shares one expensive setup: node 1 runs it
//! (phase A) and hands the resulting bytes to every node, and each node then
//! runs its own setup with those bytes (phase B).
//!
//! # Architecture
//!
//! - **Setup**: producer/consumer bodies, phase runner, two-phase orchestrator
//! - **Distributed**: node identity, the JSON state record, HTTP and in-memory
//!   state channels, the follower poll loop
//! - **Shell bodies**: drive both phases from shell commands
//! - **Config / output**: CLI and TOML configuration, text and JSON summaries

pub mod config;
pub mod distributed;
pub mod output;
pub mod setup;
pub mod shell;
pub mod util;

// Re-export commonly used types
pub use config::SyncConfig;
pub use distributed::{NodeIdentity, StateChannel};
pub use setup::{CompoundSetup, Consumer, Producer, SetupBuilder};

/// Result type used throughout syncsuite
pub type Result<T> = anyhow::Result<T>;
