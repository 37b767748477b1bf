//! Configuration validation

use super::*;
use anyhow::{Context, Result};

/// Validate complete configuration
pub fn validate_config(config: &SyncConfig) -> Result<()> {
    validate_node(&config.node)?;
    validate_setup(&config.setup)?;
    Ok(())
}

/// Validate the node's place in the fleet
pub fn validate_node(node: &NodeConfig) -> Result<()> {
    NodeIdentity::new(node.ordinal, node.total).context("Invalid node configuration")?;

    if node.total > 1 {
        let host = node
            .sync_host
            .as_deref()
            .filter(|h| !h.trim().is_empty())
            .with_context(|| format!("sync_host is required when running on {} nodes", node.total))?;

        if !(host.starts_with("http://") || host.starts_with("https://")) {
            anyhow::bail!("sync_host must be an http:// or https:// URL, got '{}'", host);
        }
    }

    Ok(())
}

/// Validate phase commands and timing
pub fn validate_setup(setup: &SetupConfig) -> Result<()> {
    if setup.producer.trim().is_empty() {
        anyhow::bail!("producer command must not be empty");
    }
    if setup.consumer.trim().is_empty() {
        anyhow::bail!("consumer command must not be empty");
    }
    if setup.timeout.is_zero() {
        anyhow::bail!("timeout must be greater than zero");
    }
    if let Some(wait) = setup.wait_timeout {
        // Node 1 may start late, so its whole phase must fit in the wait
        if wait <= setup.timeout {
            anyhow::bail!(
                "wait_timeout ({:?}) must be longer than timeout ({:?})",
                wait,
                setup.timeout
            );
        }
    }
    if setup.poll_interval.is_zero() {
        anyhow::bail!("poll_interval must be greater than zero");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn valid_config() -> SyncConfig {
        SyncConfig {
            node: NodeConfig {
                ordinal: 2,
                total: 3,
                sync_host: Some("http://127.0.0.1:8077".to_string()),
            },
            setup: SetupConfig {
                producer: "echo payload".to_string(),
                consumer: "cat".to_string(),
                ..SetupConfig::default()
            },
            output: OutputConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_ordinal_range() {
        let mut config = valid_config();
        config.node.ordinal = 0;
        assert!(validate_config(&config).is_err());

        config.node.ordinal = 4;
        let err = validate_config(&config).unwrap_err();
        assert!(format!("{:#}", err).contains("between 1 and 3"));

        config.node.ordinal = 3;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_sync_host() {
        let mut config = valid_config();
        config.node.sync_host = None;
        assert!(validate_config(&config).is_err());

        config.node.sync_host = Some("  ".to_string());
        assert!(validate_config(&config).is_err());

        config.node.sync_host = Some("127.0.0.1:8077".to_string());
        assert!(validate_config(&config).is_err());

        config.node.sync_host = Some("https://sync.internal".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_single_node_needs_no_sync_host() {
        let mut config = valid_config();
        config.node.ordinal = 1;
        config.node.total = 1;
        config.node.sync_host = None;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_setup() {
        let mut config = valid_config();
        config.setup.producer = String::new();
        assert!(validate_config(&config).is_err());

        let mut config = valid_config();
        config.setup.consumer = " ".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = valid_config();
        config.setup.timeout = Duration::ZERO;
        assert!(validate_config(&config).is_err());

        let mut config = valid_config();
        config.setup.poll_interval = Duration::ZERO;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_wait_timeout() {
        let mut config = valid_config();
        config.setup.timeout = Duration::from_secs(60);

        config.setup.wait_timeout = Some(Duration::from_secs(60));
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("must be longer than timeout"));

        config.setup.wait_timeout = Some(Duration::from_secs(120));
        assert!(validate_config(&config).is_ok());

        config.setup.wait_timeout = None;
        assert!(validate_config(&config).is_ok());
    }
}
