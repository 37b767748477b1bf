//! TOML configuration file parsing

use super::*;
use crate::config::cli::Cli;
use crate::util::time::parse_duration;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<SyncConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<SyncConfig> {
    let config: SyncConfig = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: SyncConfig) -> Result<SyncConfig> {
    if let Some(ordinal) = cli.node {
        config.node.ordinal = ordinal;
    }
    if let Some(total) = cli.nodes {
        config.node.total = total;
    }
    if let Some(ref host) = cli.sync_host {
        config.node.sync_host = Some(host.clone());
    }

    if let Some(ref producer) = cli.producer {
        config.setup.producer = producer.clone();
    }
    if let Some(ref consumer) = cli.consumer {
        config.setup.consumer = consumer.clone();
    }
    if let Some(ref timeout) = cli.timeout {
        config.setup.timeout =
            parse_duration(timeout).with_context(|| format!("Invalid --timeout: {}", timeout))?;
    }
    if let Some(ref wait) = cli.wait_timeout {
        config.setup.wait_timeout = Some(
            parse_duration(wait).with_context(|| format!("Invalid --wait-timeout: {}", wait))?,
        );
    }
    if let Some(ref interval) = cli.poll_interval {
        config.setup.poll_interval = parse_duration(interval)
            .with_context(|| format!("Invalid --poll-interval: {}", interval))?;
    }

    if cli.json {
        config.output.json = true;
    }

    Ok(config)
}
