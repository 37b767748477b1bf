//! Human-readable text output

use crate::distributed::node::NodeIdentity;
use crate::setup::outcome::SetupSummary;
use crate::util::time::format_duration;
use std::fmt::Write;

/// Print the setup summary to console
pub fn print_summary(summary: &SetupSummary, node: NodeIdentity) {
    print!("{}", format_summary(summary, node));
}

/// Render the setup summary as text
pub fn format_summary(summary: &SetupSummary, node: NodeIdentity) -> String {
    let mut out = String::new();
    let state = summary
        .state
        .map_or_else(|| "not run".to_string(), |s| s.to_string());

    let _ = writeln!(out, "═══════════════════════════════════════════════════════════");
    let _ = writeln!(out, "                SYNCHRONIZED BEFORESUITE");
    let _ = writeln!(out, "═══════════════════════════════════════════════════════════");
    let _ = writeln!(out, "Node:     {}", node);
    let _ = writeln!(out, "Location: {}", summary.code_location);
    let _ = writeln!(out, "State:    {}", state.to_uppercase());
    let _ = writeln!(out, "Run Time: {}", format_duration(summary.run_time));

    if let Some(ref failure) = summary.failure {
        let _ = writeln!(out);
        let _ = writeln!(out, "Failure:");
        let _ = writeln!(out, "  {}", failure.message);
        let _ = writeln!(
            out,
            "  in {} #{} at {}",
            failure.component_type, failure.component_index, failure.location
        );
        if let Some(ref panic) = failure.forwarded_panic {
            let _ = writeln!(out, "  panic: {}", panic);
        }
    }

    out
}
