//! CLI argument parsing using clap

use clap::Parser;
use std::path::PathBuf;

/// syncsuite - run a synchronized before-suite setup on one node of a fleet
#[derive(Parser, Debug)]
#[command(name = "syncsuite")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// This node's 1-based ordinal (node 1 runs the producer)
    #[arg(long, env = "SYNCSUITE_NODE")]
    pub node: Option<usize>,

    /// Total number of nodes in the fleet
    #[arg(long, env = "SYNCSUITE_NODES")]
    pub nodes: Option<usize>,

    /// Base URL of the sync host (e.g., "http://127.0.0.1:8077")
    #[arg(long, env = "SYNCSUITE_SYNC_HOST")]
    pub sync_host: Option<String>,

    /// Shell command for the shared setup; its stdout becomes the payload
    #[arg(long)]
    pub producer: Option<String>,

    /// Shell command for the per-node setup; receives the payload on stdin
    #[arg(long)]
    pub consumer: Option<String>,

    /// Per-phase timeout (e.g., 60s, 5m)
    #[arg(long)]
    pub timeout: Option<String>,

    /// How long followers wait for node 1 (default: no limit)
    #[arg(long)]
    pub wait_timeout: Option<String>,

    /// Interval between polls of the sync host (e.g., 50ms)
    #[arg(long)]
    pub poll_interval: Option<String>,

    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.node == Some(0) {
            anyhow::bail!("--node must be at least 1");
        }
        if self.nodes == Some(0) {
            anyhow::bail!("--nodes must be at least 1");
        }
        if self.config.is_none() && (self.producer.is_none() || self.consumer.is_none()) {
            anyhow::bail!("--producer and --consumer are required without --config");
        }
        Ok(())
    }
}
