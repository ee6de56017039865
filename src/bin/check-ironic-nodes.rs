//! Check Ironic baremetal nodes for maintenance state.
//!
//! Shells out to the `openstack` CLI instead of talking to the API directly;
//! that is what operators run by hand and it sidesteps the SSL quirks the
//! ironic API is known for. The CLI picks its credentials up from the usual
//! `OS_*` environment.

use clap::{ArgAction, CommandFactory, Parser};
use serde::Deserialize;

use osnag::{
    icinga, run_json_command, Check, CheckError, CheckResult, Metric, MetricSummary, ProbeError,
    Range, Resource, Runner, ScalarContext,
};

/// Nagios/Icinga check for Ironic nodes in maintenance.
#[derive(Debug, Parser)]
#[command(name = "check-ironic-nodes", version, about)]
struct Args {
    /// Return warning if the number of nodes in maintenance is outside RANGE
    /// (default: warn if any node is in maintenance)
    #[arg(short = 'w', long, value_name = "RANGE", default_value = "@1:")]
    warn: String,

    /// Return critical if the number of nodes in maintenance is outside RANGE
    #[arg(short = 'c', long, value_name = "RANGE", default_value = "0:")]
    critical: String,

    /// The OpenStack client executable to run
    #[arg(long, value_name = "CMD", default_value = "openstack")]
    openstack_cmd: String,

    /// Increase diagnostic output on stderr (up to three times)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Deserialize)]
struct NodeRow {
    #[serde(rename = "Maintenance", alias = "maintenance")]
    maintenance: bool,
}

struct IronicNodes {
    openstack_cmd: String,
}

impl Resource for IronicNodes {
    fn probe(&self) -> Result<Vec<Metric>, ProbeError> {
        let raw = run_json_command(
            &self.openstack_cmd,
            &[
                "baremetal",
                "node",
                "list",
                "--fields",
                "uuid",
                "maintenance",
                "-f",
                "json",
            ],
        )?;
        let nodes: Vec<NodeRow> = serde_json::from_value(raw)?;

        let total = nodes.len();
        let maintenance = nodes.iter().filter(|n| n.maintenance).count();

        Ok(vec![
            Metric::new("maintenance", maintenance as f64).min(0.0),
            Metric::new("total", total as f64).min(0.0),
        ])
    }
}

fn run(args: &Args) -> Result<CheckResult, CheckError> {
    let warning: Range = args.warn.parse()?;
    let critical: Range = args.critical.parse()?;
    // An empty node list is its own problem, independent of maintenance.
    let total_warning: Range = "0:".parse()?;
    let total_critical: Range = "@0".parse()?;

    let resource = IronicNodes {
        openstack_cmd: args.openstack_cmd.clone(),
    };
    let result = Check::new()
        .context(ScalarContext::new("maintenance", warning, critical))
        .context(ScalarContext::new("total", total_warning, total_critical))
        .summary(MetricSummary::of(&["maintenance", "total"]))
        .run(&resource)?;
    Ok(result)
}

fn main() {
    if let Err(e) =
        icinga::print_command_config_if_env_and_exit("check-ironic-nodes", &Args::command())
    {
        eprintln!("cannot generate command config: {}", e);
        std::process::exit(3);
    }

    let args = Args::parse();
    osnag::init_diagnostics(args.verbose);

    Runner::new().safe_run(|| run(&args)).print_and_exit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_rows_from_cli_json() {
        let raw = serde_json::json!([
            { "UUID": "aaa", "Maintenance": false },
            { "UUID": "bbb", "Maintenance": true },
            { "UUID": "ccc", "Maintenance": false },
        ]);
        let nodes: Vec<NodeRow> = serde_json::from_value(raw).unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes.iter().filter(|n| n.maintenance).count(), 1);
    }

    #[test]
    fn test_node_rows_accept_raw_api_keys() {
        let raw = serde_json::json!([{ "uuid": "aaa", "maintenance": true }]);
        let nodes: Vec<NodeRow> = serde_json::from_value(raw).unwrap();
        assert!(nodes[0].maintenance);
    }

    #[test]
    fn test_default_ranges() {
        // "@1:" alerts for any count >= 1, "0:" never alerts on counts.
        let warn: Range = "@1:".parse().unwrap();
        assert!(!warn.check(0.0));
        assert!(warn.check(1.0));
        assert!(warn.check(7.0));

        let crit: Range = "0:".parse().unwrap();
        assert!(!crit.check(0.0));
        assert!(!crit.check(7.0));
    }
}
