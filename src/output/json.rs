//! JSON output formatting

use crate::distributed::node::NodeIdentity;
use crate::setup::outcome::{CodeLocation, ComponentType, PhaseFailure, PhaseState, SetupSummary};
use crate::util::time::format_duration;
use crate::Result;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Duration with both microseconds and human-readable format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonDuration {
    pub micros: u64,
    pub human: String,
}

impl JsonDuration {
    pub fn from_duration(d: Duration) -> Self {
        Self {
            micros: d.as_micros() as u64,
            human: format_duration(d),
        }
    }
}

/// Machine-readable report of one node's setup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSetupReport {
    pub node: usize,
    pub total_nodes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// RFC 3339, UTC
    pub timestamp: String,
    pub component_type: ComponentType,
    pub code_location: CodeLocation,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<PhaseState>,
    pub run_time: JsonDuration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<PhaseFailure>,
}

/// Build the JSON report for a finished setup
pub fn build_report(
    summary: &SetupSummary,
    node: NodeIdentity,
    hostname: Option<String>,
) -> JsonSetupReport {
    JsonSetupReport {
        node: node.ordinal(),
        total_nodes: node.total(),
        hostname,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        component_type: summary.component_type,
        code_location: summary.code_location.clone(),
        passed: summary.passed(),
        state: summary.state,
        run_time: JsonDuration::from_duration(summary.run_time),
        failure: summary.failure.clone(),
    }
}

/// Print the report to stdout
pub fn print_report(report: &JsonSetupReport, pretty: bool) -> Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };
    println!("{}", rendered);
    Ok(())
}
