//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.
//! CLI flags (and their environment fallbacks) override values from the file.

pub mod cli;
pub mod toml;
pub mod validator;

use crate::distributed::node::{NodeError, NodeIdentity};
use crate::distributed::poll::DEFAULT_POLL_INTERVAL;
use crate::setup::compound::DEFAULT_TIMEOUT;
use crate::util::time::serde_duration;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete configuration for one node's synchronized setup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub setup: SetupConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Position of this process in the fleet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// 1-based node ordinal; node 1 runs phase A
    #[serde(default = "default_ordinal")]
    pub ordinal: usize,
    /// Number of nodes in the fleet
    #[serde(default = "default_total")]
    pub total: usize,
    /// Base URL of the relay serving the before-suite state
    pub sync_host: Option<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            ordinal: default_ordinal(),
            total: default_total(),
            sync_host: None,
        }
    }
}

/// Phase bodies and timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupConfig {
    /// Shell command for phase A; its stdout is the shared payload
    #[serde(default)]
    pub producer: String,
    /// Shell command for phase B; receives the payload on stdin
    #[serde(default)]
    pub consumer: String,
    /// Per-phase timeout
    #[serde(default = "default_timeout", with = "serde_duration")]
    pub timeout: Duration,
    /// How long a follower waits for node 1; unbounded when absent
    #[serde(default, with = "serde_duration::option", skip_serializing_if = "Option::is_none")]
    pub wait_timeout: Option<Duration>,
    #[serde(default = "default_poll_interval", with = "serde_duration")]
    pub poll_interval: Duration,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            producer: String::new(),
            consumer: String::new(),
            timeout: default_timeout(),
            wait_timeout: None,
            poll_interval: default_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Print the summary as JSON instead of text
    #[serde(default)]
    pub json: bool,
}

impl SyncConfig {
    pub fn node_identity(&self) -> Result<NodeIdentity, NodeError> {
        NodeIdentity::new(self.node.ordinal, self.node.total)
    }
}

fn default_ordinal() -> usize {
    1
}

fn default_total() -> usize {
    1
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}
