//! syncsuite CLI entry point

use anyhow::{Context, Result};
use std::process::ExitCode;
use std::sync::Arc;
use syncsuite::config::{cli::Cli, toml, validator, SyncConfig};
use syncsuite::distributed::{node::host_label, HttpStateChannel};
use syncsuite::output;
use syncsuite::setup::{CodeLocation, SetupBuilder};
use syncsuite::shell;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Setup failed on this node
const EXIT_SETUP_FAILED: u8 = 1;
/// Invalid configuration; nothing ran
const EXIT_CONFIG_ERROR: u8 = 2;

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse_args();
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    match run(&cli, &config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_SETUP_FAILED),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}

/// Logs go to stderr; stdout carries the summary
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Build configuration from the optional file and the CLI (CLI wins)
fn load_config(cli: &Cli) -> Result<SyncConfig> {
    cli.validate()?;

    let config = match cli.config {
        Some(ref path) => toml::parse_toml_file(path)?,
        None => SyncConfig::default(),
    };
    let config = toml::merge_cli_with_config(cli, config)?;
    validator::validate_config(&config)?;

    Ok(config)
}

/// Run the synchronized setup for this node, returning whether it passed
fn run(cli: &Cli, config: &SyncConfig) -> Result<bool> {
    let node = config.node_identity()?;
    let hostname = host_label();
    info!(%node, host = %hostname, "syncsuite v{}", env!("CARGO_PKG_VERSION"));

    // Failures are attributed to the config file when there is one
    let location = match cli.config {
        Some(ref path) => CodeLocation::new(path.display().to_string(), 0),
        None => CodeLocation::new("<command line>", 0),
    };

    let mut builder = SetupBuilder::new()
        .producer(shell::producer_from_command(config.setup.producer.clone()))
        .consumer(shell::consumer_from_command(config.setup.consumer.clone()))
        .location(location)
        .node(node)
        .timeout(config.setup.timeout)
        .poll_interval(config.setup.poll_interval);
    if let Some(wait) = config.setup.wait_timeout {
        builder = builder.wait_timeout(wait);
    }

    if node.is_distributed() {
        let host = config
            .node
            .sync_host
            .as_deref()
            .context("sync_host is required for distributed runs")?;
        let channel = HttpStateChannel::new(host)?;
        info!(url = channel.url(), "Using sync host");
        builder = builder.channel(Arc::new(channel));
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    let passed = runtime.block_on(async {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling setup");
                let _ = cancel_tx.send(true);
            }
        });

        let mut setup = builder.cancellation(cancel_rx).build()?;
        let passed = setup.run().await;
        let summary = setup.summary();

        if config.output.json {
            let report = output::json::build_report(&summary, node, Some(hostname));
            output::json::print_report(&report, true)?;
        } else {
            output::text::print_summary(&summary, node);
        }

        Ok::<bool, anyhow::Error>(passed)
    })?;

    // Abandoned bodies may still be running on the blocking pool
    runtime.shutdown_background();
    Ok(passed)
}

